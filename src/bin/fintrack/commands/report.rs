use fintrack::{
    Error,
    account::Account,
    report::{
        StatementLine, calculate_profit, generate_account_summary, generate_balance_sheet,
        generate_cash_flow_statement, generate_income_statement, generate_trend_analysis,
    },
};

use crate::{
    args::ReportCommand,
    context::Context,
    output::{or_dash, print_table},
};

pub fn run(context: &mut Context, command: ReportCommand) -> Result<(), Error> {
    context.session.require_login()?;

    match command {
        ReportCommand::Profit(range) => {
            let report = calculate_profit(range.from, range.to, &context.connection)?;

            context.emit(&report, |report| {
                println!("Profit from {} to {}", report.start_date, report.end_date);
                println!("Income:        {}", context.money(report.total_income));
                println!("Expenses:      {}", context.money(report.total_expense));
                println!("Net profit:    {}", context.money(report.net_profit));
                println!("Margin:        {:.2}%", report.gross_margin);
                println!("Transactions:  {}", report.transaction_count);
            })
        }
        ReportCommand::IncomeStatement(range) => {
            let statement = generate_income_statement(range.from, range.to, &context.connection)?;

            context.emit(&statement, |statement| {
                println!(
                    "Income statement from {} to {}",
                    statement.start_date, statement.end_date
                );
                println!();
                print_lines(context, "Income", &statement.income, statement.total_income);
                println!();
                print_lines(context, "Expenses", &statement.expenses, statement.total_expense);
                println!();
                println!("Net profit: {}", context.money(statement.net_profit));
            })
        }
        ReportCommand::BalanceSheet { as_of } => {
            let as_of = as_of.unwrap_or_else(|| context.today());
            let sheet = generate_balance_sheet(as_of, &context.connection)?;

            context.emit(&sheet, |sheet| {
                println!("Balance sheet as of {}", sheet.as_of);
                println!();
                print_section(context, "Assets", &sheet.assets, sheet.total_assets);
                println!();
                print_section(context, "Liabilities", &sheet.liabilities, sheet.total_liabilities);
                println!();
                print_section(context, "Equity", &sheet.equity, sheet.total_equity);
                println!();

                if sheet.balance_valid {
                    println!("Assets equal liabilities plus equity.");
                } else {
                    println!("Assets do not equal liabilities plus equity!");
                }
            })
        }
        ReportCommand::CashFlow(range) => {
            let statement =
                generate_cash_flow_statement(range.from, range.to, &context.connection)?;

            context.emit(&statement, |statement| {
                println!(
                    "Cash flow from {} to {}",
                    statement.start_date, statement.end_date
                );
                println!("Operating:     {}", context.money(statement.operating_cash_flow));
                println!("Investing:     {}", context.money(statement.investing_cash_flow));
                println!("Financing:     {}", context.money(statement.financing_cash_flow));
                println!("Net increase:  {}", context.money(statement.net_cash_increase));
            })
        }
        ReportCommand::Trend { months } => {
            let trend =
                generate_trend_analysis(months.into(), context.today(), &context.connection)?;

            context.emit(&trend, |trend| {
                let rows: Vec<_> = trend
                    .iter()
                    .map(|month| {
                        [
                            month.label.clone(),
                            context.money(month.income),
                            context.money(month.expense),
                            context.money(month.profit),
                            month.transaction_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(["Month", "Income", "Expenses", "Profit", "Transactions"], &rows);
            })
        }
        ReportCommand::Accounts { range } => {
            let report = generate_account_summary(range.from, range.to, &context.connection)?;

            context.emit(&report, |report| {
                let rows: Vec<_> = report
                    .accounts
                    .iter()
                    .map(|account| {
                        [
                            account.account_id.to_string(),
                            account.name.clone(),
                            account.account_type.to_string(),
                            context.money(account.balance),
                            context.money(account.total_income),
                            context.money(account.total_expense),
                            account.transaction_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(
                    ["ID", "Account", "Type", "Balance", "Income", "Expenses", "Transactions"],
                    &rows,
                );
                println!();

                let rows: Vec<_> = report
                    .by_type
                    .iter()
                    .map(|totals| {
                        [
                            totals.account_type.to_string(),
                            totals.account_count.to_string(),
                            context.money(totals.total_balance),
                            context.money(totals.total_income),
                            context.money(totals.total_expense),
                            totals.transaction_count.to_string(),
                        ]
                    })
                    .collect();
                print_table(
                    ["Type", "Accounts", "Balance", "Income", "Expenses", "Transactions"],
                    &rows,
                );

                if report.start_date.is_some() || report.end_date.is_some() {
                    println!(
                        "Activity from {} to {}",
                        or_dash(report.start_date),
                        or_dash(report.end_date)
                    );
                }
            })
        }
    }
}

fn print_lines(context: &Context, title: &str, lines: &[StatementLine], total: f64) {
    println!("{title}");

    for line in lines {
        println!("  {:<30} {:>16}", line.category, context.money(line.amount));
    }

    println!("  {:<30} {:>16}", "Total", context.money(total));
}

fn print_section(context: &Context, title: &str, accounts: &[Account], total: f64) {
    println!("{title}");

    for account in accounts {
        println!("  {:<30} {:>16}", account.name, context.money(account.balance));
    }

    println!("  {:<30} {:>16}", "Total", context.money(total));
}
