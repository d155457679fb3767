use chrono::Utc;
use sea_orm::{Condition, QueryFilter, QueryOrder, prelude::*};

use crate::{
    CreateGroupCmd, EngineError, Group, Member, MemberProfile, MemberRegistry, ResultEngine,
    balances, groups, members,
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a group with its creator as the first member.
    pub async fn create_group(&self, cmd: CreateGroupCmd) -> ResultEngine<Group> {
        let now = Utc::now();
        let mut group = Group::new(&cmd.name, cmd.category.as_deref(), "", now)?;
        let creator = Member::new(&group.id, &cmd.creator, now)?;
        group.created_by = creator.member_id.clone();

        with_tx!(self, |db_tx| {
            groups::ActiveModel::from(&group).insert(&db_tx).await?;
            members::ActiveModel::from(&creator).insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!("created group {} ({})", group.name, group.id);
        group.members.push(creator);
        Ok(group)
    }

    /// Returns the group with its current members.
    pub async fn group(&self, group_id: &str) -> ResultEngine<Group> {
        let model = self.require_group(&self.database, group_id).await?;
        let mut group = Group::from(model);
        group.members = self.list_members(group_id).await?;
        Ok(group)
    }

    /// Groups `member_id` currently belongs to, oldest first.
    pub async fn groups_for_member(&self, member_id: &str) -> ResultEngine<Vec<Group>> {
        let rows = groups::Entity::find()
            .inner_join(members::Entity)
            .filter(members::Column::MemberId.eq(member_id))
            .order_by_asc(groups::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for model in rows {
            let mut group = Group::from(model);
            group.members = self.list_members(&group.id).await?;
            out.push(group);
        }
        Ok(out)
    }

    /// Members of a group in join order.
    pub async fn list_members(&self, group_id: &str) -> ResultEngine<Vec<Member>> {
        let rows = members::Entity::find()
            .filter(members::Column::GroupId.eq(group_id))
            .order_by_asc(members::Column::JoinedAt)
            .order_by_asc(members::Column::MemberId)
            .all(&self.database)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    /// Adds a member to a group. Fails with `ExistingKey` if the id is taken.
    pub async fn add_member(&self, group_id: &str, profile: MemberProfile) -> ResultEngine<Member> {
        let member = Member::new(group_id, &profile, Utc::now())?;
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let existing =
                members::Entity::find_by_id((group_id.to_string(), member.member_id.clone()))
                    .one(&db_tx)
                    .await?;
            if existing.is_some() {
                return Err(EngineError::ExistingKey(member.member_id.clone()));
            }
            members::ActiveModel::from(&member).insert(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!("member {} joined group {group_id}", member.member_id);
        Ok(member)
    }

    /// Removes a member from a group.
    ///
    /// The ledger never discards a debt: while any edge touches the member
    /// the removal fails with `MemberHasOpenBalance`, naming the
    /// counterparties. Settle first, then retry.
    pub async fn remove_member(&self, group_id: &str, member_id: &str) -> ResultEngine<()> {
        let _guard = self.lock_group(group_id).await?;
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let existing = members::Entity::find_by_id((group_id.to_string(), member_id.to_string()))
                .one(&db_tx)
                .await?;
            if existing.is_none() {
                return Err(EngineError::KeyNotFound("member not exists".to_string()));
            }

            let open = self.open_balances_for(&db_tx, group_id, member_id).await?;
            if !open.is_empty() {
                let counterparties: Vec<String> = open
                    .iter()
                    .map(|b| {
                        if b.debtor_id == member_id {
                            format!("owes {} {}", b.creditor_id, b.amount_minor)
                        } else {
                            format!("is owed {} by {}", b.amount_minor, b.debtor_id)
                        }
                    })
                    .collect();
                return Err(EngineError::MemberHasOpenBalance(format!(
                    "{member_id} {}",
                    counterparties.join(", ")
                )));
            }

            members::Entity::delete_by_id((group_id.to_string(), member_id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!("member {member_id} left group {group_id}");
        Ok(())
    }

    async fn open_balances_for(
        &self,
        db: &impl ConnectionTrait,
        group_id: &str,
        member_id: &str,
    ) -> ResultEngine<Vec<crate::Balance>> {
        balances::Entity::find()
            .filter(balances::Column::GroupId.eq(group_id))
            .filter(
                Condition::any()
                    .add(balances::Column::DebtorId.eq(member_id))
                    .add(balances::Column::CreditorId.eq(member_id)),
            )
            .order_by_asc(balances::Column::DebtorId)
            .order_by_asc(balances::Column::CreditorId)
            .all(db)
            .await?
            .into_iter()
            .map(crate::Balance::try_from)
            .collect()
    }
}

impl MemberRegistry for Engine {
    async fn resolve_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> ResultEngine<Option<MemberProfile>> {
        let row = members::Entity::find_by_id((group_id.to_string(), member_id.to_string()))
            .one(&self.database)
            .await?;
        Ok(row.map(|m| Member::from(m).profile()))
    }
}
