use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{
    CreateGroupCmd, Engine, ExpenseListFilter, ExpenseMeta, LedgerReport, MemberProfile,
    MoneyCents, RecordExpenseCmd, SettleCmd,
};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "splitledger_admin")]
#[command(about = "Admin utilities for SplitLedger (inspect, verify and repair group ledgers)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitledger.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Group(Group),
    Member(Member),
    Expense(Expense),
    /// Record a repayment between two members.
    Settle(SettleArgs),
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(GroupCreateArgs),
    /// Members, total and balances of a group.
    Show { group_id: String },
    /// Compare stored balances and total with a replay of the expense log.
    Verify { group_id: String },
    /// Overwrite stored balances and total with a replay of the expense log.
    Rebuild { group_id: String },
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    creator_id: String,
    #[arg(long)]
    creator_name: String,
}

#[derive(Args, Debug)]
struct Member {
    #[command(subcommand)]
    command: MemberCommand,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    Add(MemberAddArgs),
    Remove {
        #[arg(long)]
        group: String,
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
struct MemberAddArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    avatar: Option<String>,
}

#[derive(Args, Debug)]
struct Expense {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    Record(ExpenseRecordArgs),
    Reverse { expense_id: Uuid },
    List {
        group_id: String,
        /// Include reversed events.
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
struct ExpenseRecordArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    payer: String,
    /// Comma separated, in split order.
    #[arg(long, value_delimiter = ',', required = true)]
    participants: Vec<String>,
    /// Decimal amount, e.g. `12.34`.
    #[arg(long, value_parser = parse_money)]
    amount: MoneyCents,
    #[arg(long)]
    title: String,
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct SettleArgs {
    #[arg(long)]
    group: String,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long, value_parser = parse_money)]
    amount: MoneyCents,
}

fn parse_money(raw: &str) -> Result<MoneyCents, String> {
    let amount: MoneyCents = raw.parse().map_err(|err| format!("{err}"))?;
    if !amount.is_positive() {
        return Err("amount must be > 0".to_string());
    }
    Ok(amount)
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_report(report: &LedgerReport) {
    println!(
        "total: stored {} / replayed {}",
        MoneyCents::new(report.stored_total_minor),
        MoneyCents::new(report.replayed_total_minor)
    );
    for (debtor, creditor, amount) in &report.stored {
        if !report.replayed.contains(&(debtor.clone(), creditor.clone(), *amount)) {
            println!("  stored only:   {debtor} -> {creditor} {}", MoneyCents::new(*amount));
        }
    }
    for (debtor, creditor, amount) in &report.replayed {
        if !report.stored.contains(&(debtor.clone(), creditor.clone(), *amount)) {
            println!("  replayed only: {debtor} -> {creditor} {}", MoneyCents::new(*amount));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Group(Group {
            command: GroupCommand::Create(args),
        }) => {
            let creator = MemberProfile::new(&args.creator_id, &args.creator_name, None);
            let mut cmd = CreateGroupCmd::new(args.name, creator);
            if let Some(category) = args.category {
                cmd = cmd.category(category);
            }
            let group = engine.create_group(cmd).await?;
            println!("created group: {} ({})", group.name, group.id);
        }
        Command::Group(Group {
            command: GroupCommand::Show { group_id },
        }) => {
            let group = engine.group(&group_id).await?;
            println!("{} [{}]", group.name, group.category);
            println!("total: {}", MoneyCents::new(group.total_expense_minor));
            println!("members:");
            for member in &group.members {
                println!("  {} ({})", member.display_name, member.member_id);
            }
            println!("balances:");
            for view in engine.describe_balances(&engine, &group_id).await? {
                println!(
                    "  {} owes {} {}",
                    view.debtor.display_name,
                    view.creditor.display_name,
                    MoneyCents::new(view.amount_minor)
                );
            }
        }
        Command::Group(Group {
            command: GroupCommand::Verify { group_id },
        }) => {
            let report = engine.verify_group(&group_id).await?;
            if report.is_consistent() {
                println!("group {group_id} is consistent");
            } else {
                println!("group {group_id} differs from its expense log");
                print_report(&report);
                std::process::exit(1);
            }
        }
        Command::Group(Group {
            command: GroupCommand::Rebuild { group_id },
        }) => {
            let report = engine.rebuild_group(&group_id).await?;
            if report.is_consistent() {
                println!("group {group_id} was already consistent");
            } else {
                print_report(&report);
                println!("group {group_id} rebuilt from its expense log");
            }
        }
        Command::Member(Member {
            command: MemberCommand::Add(args),
        }) => {
            let profile = MemberProfile::new(&args.id, &args.name, args.avatar.as_deref());
            let member = engine.add_member(&args.group, profile).await?;
            println!("added member: {} ({})", member.display_name, member.member_id);
        }
        Command::Member(Member {
            command: MemberCommand::Remove { group, id },
        }) => {
            engine.remove_member(&group, &id).await?;
            println!("removed member: {id}");
        }
        Command::Expense(Expense {
            command: ExpenseCommand::Record(args),
        }) => {
            let mut meta = ExpenseMeta::new(args.title, Utc::now());
            if let Some(category) = args.category {
                meta = meta.category(category);
            }
            let outcome = engine
                .record_expense(RecordExpenseCmd::new(
                    args.group,
                    args.payer,
                    args.participants,
                    args.amount.cents(),
                    meta,
                ))
                .await?;
            println!(
                "recorded expense {} (group total {})",
                outcome.expense_id,
                MoneyCents::new(outcome.group_total_minor)
            );
        }
        Command::Expense(Expense {
            command: ExpenseCommand::Reverse { expense_id },
        }) => {
            let outcome = engine.reverse_expense(expense_id).await?;
            println!(
                "reversed expense {expense_id} (group total {})",
                MoneyCents::new(outcome.group_total_minor)
            );
        }
        Command::Expense(Expense {
            command: ExpenseCommand::List { group_id, all },
        }) => {
            let filter = ExpenseListFilter {
                kinds: None,
                include_reversed: all,
            };
            for expense in engine.list_expenses(&group_id, &filter).await? {
                let mark = if expense.is_reversed() { " (reversed)" } else { "" };
                println!(
                    "#{} {} {} paid {} [{}]{mark}",
                    expense.seq,
                    expense.id,
                    expense.payer_id,
                    MoneyCents::new(expense.amount_minor),
                    expense.title
                );
            }
        }
        Command::Settle(args) => {
            let outcome = engine
                .settle(SettleCmd::new(
                    args.group,
                    args.from,
                    args.to,
                    args.amount.cents(),
                    Utc::now(),
                ))
                .await?;
            println!("recorded settlement {}", outcome.expense_id);
        }
    }

    Ok(())
}
