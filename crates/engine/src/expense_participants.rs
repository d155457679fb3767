//! Split-among rows of an expense, with the share each participant was charged.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::netting::Share;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub member_id: String,
    pub position: i32,
    pub share_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) fn active_models(expense_id: Uuid, shares: &[Share]) -> Vec<ActiveModel> {
    shares
        .iter()
        .enumerate()
        .map(|(position, share)| ActiveModel {
            expense_id: ActiveValue::Set(expense_id.to_string()),
            member_id: ActiveValue::Set(share.member_id.clone()),
            position: ActiveValue::Set(position as i32),
            share_minor: ActiveValue::Set(share.amount_minor),
        })
        .collect()
}
