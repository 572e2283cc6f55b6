use anyhow::{Context, Result};
use std::fs::File;

use super::{activity_cell, flag_value, parse_amount, shellexpand};
use crate::activity::{ActivityReader, TransactionTable};
use crate::config::Config;
use crate::db::{self, Database};
use crate::ledger::{self, retry_aborted, BudgetChange};
use crate::models::{LedgerKey, Month, Transaction};

pub fn as_cli(args: &[String], db: &mut Database, config: &Config) -> Result<()> {
    let retries = config.retries;
    match args[1].as_str() {
        "create" => cli_create(&args[2..], db, retries),
        "update" => cli_update(&args[2..], db, retries),
        "set" => cli_set(&args[2..], db, retries),
        "record" => cli_record(&args[2..], db, retries),
        "show" => cli_show(&args[2..], db),
        "recompute" => cli_recompute(&args[2..], db, retries),
        "verify" => cli_verify(&args[2..], db),
        "export" => cli_export(&args[2..], db),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("monthledger {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

pub fn print_usage() {
    println!("monthledger - monthly category ledgers with carryover balances");
    println!();
    println!("Usage: monthledger <command>");
    println!();
    println!("Commands:");
    println!("  create <budget> <category> <YYYY-MM> <amount>   Create a month");
    println!("    --carryover <amount>                          Extra amount to seed the carryover with");
    println!("  update <budget> <category> <YYYY-MM> <amount>   Change an existing month's budgeted amount");
    println!("  set <budget> <category> <YYYY-MM> <amount>      Set budgeted, creating the month if needed");
    println!("  record <budget> <category> <YYYY-MM-DD> <amount> [description]");
    println!("                                                  Record a transaction and apply its activity");
    println!("  show <budget> <category>                        Print a category ledger");
    println!("  recompute [budget]                              Rebuild carryovers from transactions");
    println!("  verify [budget]                                 Report carryovers that disagree with transactions");
    println!("  export <budget> [path]                          Export a budget's ledgers to CSV");
    println!("  --help, -h                                      Show this help");
    println!("  --version, -V                                   Show version");
    println!();
    println!("Environment:");
    println!("  MONTHLEDGER_DB, MONTHLEDGER_LOG, MONTHLEDGER_BUSY_TIMEOUT_MS, MONTHLEDGER_RETRIES");
}

fn cli_create(args: &[String], db: &mut Database, retries: u32) -> Result<()> {
    let [budget, category, month, amount, rest @ ..] = args else {
        anyhow::bail!(
            "Usage: monthledger create <budget> <category> <YYYY-MM> <amount> [--carryover <amount>]"
        );
    };
    let key = LedgerKey::parse(budget, category, month)?;
    let budgeted = parse_amount(amount)?;
    let carryover = flag_value(rest, "--carryover")
        .map(parse_amount)
        .transpose()?
        .unwrap_or_default();

    let entry = retry_aborted(retries, || db.create_month(&key, budgeted, carryover))?;
    println!(
        "Created {}: budgeted {:.2}, carryover {:.2}",
        entry.key(),
        entry.budgeted,
        entry.carryover_balance
    );
    Ok(())
}

fn cli_update(args: &[String], db: &mut Database, retries: u32) -> Result<()> {
    let [budget, category, month, amount, ..] = args else {
        anyhow::bail!("Usage: monthledger update <budget> <category> <YYYY-MM> <amount>");
    };
    let key = LedgerKey::parse(budget, category, month)?;
    let budgeted = parse_amount(amount)?;

    retry_aborted(retries, || db.update_budgeted(&key, budgeted))?;
    println!("Updated {key}: budgeted {budgeted:.2}");
    Ok(())
}

fn cli_set(args: &[String], db: &mut Database, retries: u32) -> Result<()> {
    let [budget, category, month, amount, ..] = args else {
        anyhow::bail!("Usage: monthledger set <budget> <category> <YYYY-MM> <amount>");
    };
    let key = LedgerKey::parse(budget, category, month)?;
    let budgeted = parse_amount(amount)?;

    match retry_aborted(retries, || db.set_budgeted(&key, budgeted))? {
        BudgetChange::Created(entry) => println!(
            "Created {}: budgeted {:.2}, carryover {:.2}",
            entry.key(),
            entry.budgeted,
            entry.carryover_balance
        ),
        BudgetChange::Updated { diff } => println!("Updated {key}: budgeted changed by {diff:.2}"),
        BudgetChange::Unchanged => println!("{key} already has {budgeted:.2} budgeted"),
    }
    Ok(())
}

fn cli_record(args: &[String], db: &mut Database, retries: u32) -> Result<()> {
    let [budget, category, date, amount, description @ ..] = args else {
        anyhow::bail!(
            "Usage: monthledger record <budget> <category> <YYYY-MM-DD> <amount> [description]"
        );
    };
    let key = LedgerKey::new(budget.as_str(), category.as_str(), Month::from_date(date)?);
    let txn = Transaction::new(
        budget.clone(),
        Some(category.clone()),
        date.clone(),
        description.join(" "),
        parse_amount(amount)?,
    );

    let id = retry_aborted(retries, || {
        db.in_transaction(|tx| {
            let id = db::insert_transaction(tx, &txn)?;
            ledger::apply_activity(tx, &key, txn.amount)?;
            Ok(id)
        })
    })?;
    println!("Recorded transaction {id} ({:.2}) against {key}", txn.amount);
    Ok(())
}

fn cli_show(args: &[String], db: &mut Database) -> Result<()> {
    let [budget, category, ..] = args else {
        anyhow::bail!("Usage: monthledger show <budget> <category>");
    };
    let entries = db.get_entries(budget, category)?;
    if entries.is_empty() {
        println!("No ledger for {budget}/{category}");
        return Ok(());
    }

    println!(
        "{:<8} {:>14} {:>14} {:>14}",
        "Month", "Budgeted", "Activity", "Carryover"
    );
    println!("{}", "─".repeat(53));
    for entry in &entries {
        let activity = TransactionTable.sum_activity(db.connection(), &entry.key());
        if let Err(e) = &activity {
            tracing::warn!(key = %entry.key(), error = %e, "activity unavailable");
        }
        println!(
            "{:<8} {:>14.2} {:>14} {:>14.2}",
            entry.month,
            entry.budgeted,
            activity_cell(&activity),
            entry.carryover_balance
        );
    }
    Ok(())
}

fn cli_recompute(args: &[String], db: &mut Database, retries: u32) -> Result<()> {
    let budget_id = args.first().map(String::as_str);
    let report = retry_aborted(retries, || db.recompute_all(&TransactionTable, budget_id))?;

    println!(
        "Recomputed {} ledger(s), {} carryover(s) corrected",
        report.groups_recomputed, report.entries_changed
    );
    if !report.is_complete() {
        for skipped in &report.skipped {
            eprintln!(
                "  skipped {}/{}: {}",
                skipped.budget_id, skipped.category_id, skipped.reason
            );
        }
        anyhow::bail!("{} ledger(s) could not be recomputed", report.skipped.len());
    }
    Ok(())
}

fn cli_verify(args: &[String], db: &mut Database) -> Result<()> {
    let budget_id = args.first().map(String::as_str);
    let drifts = ledger::verify(db.connection(), &TransactionTable, budget_id)?;
    if drifts.is_empty() {
        println!("All carryovers agree with recorded activity");
        return Ok(());
    }

    for drift in &drifts {
        println!(
            "  {:<40} stored {:>14.2}  expected {:>14.2}",
            drift.key.to_string(),
            drift.stored,
            drift.expected
        );
    }
    anyhow::bail!(
        "{} carryover(s) out of date; run `monthledger recompute`",
        drifts.len()
    );
}

fn cli_export(args: &[String], db: &mut Database) -> Result<()> {
    let Some(budget) = args.first() else {
        anyhow::bail!("Usage: monthledger export <budget> [path]");
    };
    let path = args
        .get(1)
        .map(|p| shellexpand(p))
        .unwrap_or_else(|| format!("monthledger-{budget}.csv"));

    let mut entries = Vec::new();
    for (budget_id, category_id) in db.get_groups(Some(budget))? {
        entries.extend(db.get_entries(&budget_id, &category_id)?);
    }

    let file = File::create(&path).with_context(|| format!("Failed to create {path}"))?;
    let count = crate::export::write_ledger_csv(file, &entries)?;
    if count == 0 {
        println!("No ledger entries for budget {budget}");
    } else {
        println!("Exported {count} entries to {path}");
    }
    Ok(())
}
