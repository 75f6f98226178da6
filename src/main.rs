use chrono::{DateTime, NaiveDate, Utc};
use donor_ledger::config::{self, EngineConfig};
use donor_ledger::core::{DonorRow, HeaderTotals, RowKey, format_amount};
use donor_ledger::engine::AllocationEngine;
use donor_ledger::entities::{
    BudgetAllocation, DistributionRecord, FundDesignation, InvoiceRecord, InvoiceTotal, Program,
    ReportingYearRecord, SnapshotPayload,
};
use donor_ledger::errors::Result;
use donor_ledger::gateway::FixtureGateway;
use dotenvy::dotenv;
use std::collections::BTreeMap;
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file (as early as possible)
    dotenv().ok(); // Make it non-fatal, env vars can be set externally
    info!("Attempted to load .env file.");

    // 3. Load the engine configuration; a missing config.toml is fine, the
    //    defaults cover every knob
    let engine_config = match config::load_default_config() {
        Ok(loaded) => {
            info!("Loaded engine configuration from config.toml.");
            loaded.engine
        }
        Err(e) => {
            warn!("Using default engine configuration: {e}");
            EngineConfig::default()
        }
    };

    // 4. Build the gateway: DONOR_LEDGER_DATA points at a JSON dataset,
    //    otherwise the built-in sample dataset is served
    let (gateway, sample) = match env::var("DONOR_LEDGER_DATA") {
        Ok(path) => {
            let gateway = FixtureGateway::from_json_file(&path, engine_config.invoice_page_size)
                .inspect(|_| info!("Loaded dataset from {path}."))
                .inspect_err(|e| error!("Failed to load dataset from {path}: {e}"))?;
            (gateway, false)
        }
        // A snapshot limit of 2 leaves most sample invoices to the lazy
        // loader, so the walkthrough shows sums firming up on selection.
        Err(_) => (FixtureGateway::new(sample_dataset(), 2), true),
    };

    // 5. Create the engine and pull the initial snapshot
    let mut engine = AllocationEngine::new(gateway, &engine_config);
    engine
        .refresh()
        .await
        .inspect(|_| info!("Initial snapshot loaded."))
        .inspect_err(|e| error!("Failed to load initial snapshot: {}", e))?;

    render("Source rows (base)", engine.left_rows());
    render_totals(engine.header_totals());

    // 6. Walk one reassignment preview (sample dataset only; external
    //    datasets have their own row keys)
    if sample {
        preview_walkthrough(&mut engine).await?;
    }

    Ok(())
}

/// Drives one reassignment preview end to end: select both endpoints, pick
/// the invoices to move, and show the previewed destination side next to the
/// untouched source side.
async fn preview_walkthrough(engine: &mut AllocationEngine<FixtureGateway>) -> Result<()> {
    // Selecting a row pulls the remaining invoice pages for its member
    // records, so the invoiced sums firm up before the preview is computed.
    engine
        .select_source(RowKey::DonorAggregate {
            donor_name: "Alice Jennings".to_string(),
        })
        .await
        .inspect_err(|e| error!("Source selection failed: {}", e))?;
    engine
        .select_destination(RowKey::DonorAggregate {
            donor_name: "Northwind Foundation".to_string(),
        })
        .await
        .inspect_err(|e| error!("Destination selection failed: {}", e))?;
    engine.select_invoices(vec!["INV-2001".to_string(), "INV-2002".to_string()], 300.0)?;

    render("Source rows (after invoice loading)", engine.left_rows());
    render("Destination rows (previewed)", engine.right_rows());
    render_totals(engine.header_totals());

    if let (Some(source), Some(destination)) = (
        engine.resolved_source_reporting_year_id(),
        engine.resolved_destination_reporting_year_id(),
    ) {
        info!("Committing would move the invoices from record {source} to record {destination}.");
    }

    // Narrowing to one year re-keys the rows and drops the selection.
    engine.set_year(Some("2024".to_string())).await?;
    render("Source rows (2024 only)", engine.left_rows());
    render_totals(engine.header_totals());

    Ok(())
}

fn render(label: &str, rows: &[DonorRow]) {
    info!("{label}:");
    for row in rows {
        let year = row.year.as_deref().unwrap_or("all years");
        info!(
            "  {:<24} [{year}]  distributed {:>11}  invoiced {:>11}  capacity {:>11}",
            row.donor_name,
            format_amount(row.distributed),
            format_amount(row.invoiced),
            format_amount(row.capacity),
        );
    }
}

fn render_totals(totals: &HeaderTotals) {
    info!(
        "  {:<24} {:>12}  distributed {:>11}  invoiced {:>11}  capacity {:>11}",
        "TOTAL",
        "",
        format_amount(totals.distributed),
        format_amount(totals.invoiced),
        format_amount(totals.capacity),
    );
}

/// A small but complete dataset: three donors (one a two-account holding
/// group), a server-side invoice total for the fully invoiced donor, and an
/// unassigned distribution from 2023.
fn sample_dataset() -> SnapshotPayload {
    SnapshotPayload {
        programs: vec![Program {
            id: "P-COMM".to_string(),
            name: "Community Grants".to_string(),
        }],
        years: vec!["2023".to_string(), "2024".to_string()],
        fund_designations: vec![FundDesignation {
            id: "F-GEN".to_string(),
            name: "General Fund".to_string(),
        }],
        budget_allocations: vec![
            sample_budget("B-2023", "2023"),
            sample_budget("B-2024", "2024"),
        ],
        reporting_years: vec![
            sample_donor_year("RY-ALICE-24", "ACC-ALICE-001", None, "Alice Jennings", "2024"),
            sample_donor_year(
                "RY-NORTH-24",
                "ACC-NORTHWIND",
                None,
                "Northwind Foundation",
                "2024",
            ),
            sample_donor_year(
                "RY-NWA-24",
                "ACC-NW-ALPHA",
                Some("ACC-NORTHWIND"),
                "Northwind Alpha",
                "2024",
            ),
            sample_donor_year("RY-BEN-23", "ACC-BEN-007", None, "Ben Okafor", "2023"),
        ],
        distributions: vec![
            sample_distribution("D-1001", "B-2024", Some("RY-ALICE-24"), 1000.0),
            sample_distribution("D-1002", "B-2024", Some("RY-NORTH-24"), 750.0),
            sample_distribution("D-1003", "B-2024", Some("RY-NWA-24"), 250.0),
            sample_distribution("D-1004", "B-2023", Some("RY-BEN-23"), 400.0),
            DistributionRecord {
                distribution_year: Some("2023".to_string()),
                ..sample_distribution("D-1005", "B-2023", None, 150.0)
            },
        ],
        invoices: vec![
            sample_invoice("INV-2004", "RY-BEN-23", "2023", 400.0, (2023, 6, 15)),
            sample_invoice("INV-2001", "RY-ALICE-24", "2024", 200.0, (2024, 2, 10)),
            sample_invoice("INV-2002", "RY-ALICE-24", "2024", 100.0, (2024, 3, 5)),
            sample_invoice("INV-2003", "RY-NORTH-24", "2024", 150.0, (2024, 4, 1)),
        ],
        invoice_totals: vec![InvoiceTotal {
            reporting_year_id: "RY-BEN-23".to_string(),
            competence_year: "2023".to_string(),
            amount: 400.0,
        }],
        eligible_destination_account_ids: vec![
            "ACC-ALICE-001".to_string(),
            "ACC-NORTHWIND".to_string(),
            "ACC-NW-ALPHA".to_string(),
        ],
    }
}

fn sample_budget(id: &str, year: &str) -> BudgetAllocation {
    BudgetAllocation {
        id: id.to_string(),
        program_id: "P-COMM".to_string(),
        year: year.to_string(),
        fund_designation_id: "F-GEN".to_string(),
        partner_id: None,
    }
}

fn sample_donor_year(
    id: &str,
    account_id: &str,
    holding_id: Option<&str>,
    donor_name: &str,
    year: &str,
) -> ReportingYearRecord {
    ReportingYearRecord {
        id: id.to_string(),
        account_id: account_id.to_string(),
        holding_id: holding_id.map(str::to_string),
        donor_name: donor_name.to_string(),
        year: year.to_string(),
        program_id: "P-COMM".to_string(),
        free_of_charge: false,
        extra: BTreeMap::new(),
    }
}

fn sample_distribution(
    id: &str,
    budget_allocation_id: &str,
    reporting_year_id: Option<&str>,
    amount: f64,
) -> DistributionRecord {
    DistributionRecord {
        id: id.to_string(),
        budget_allocation_id: budget_allocation_id.to_string(),
        reporting_year_id: reporting_year_id.map(str::to_string),
        amount: Some(amount),
        distribution_year: None,
        program_id: "P-COMM".to_string(),
    }
}

fn sample_invoice(
    id: &str,
    reporting_year_id: &str,
    competence_year: &str,
    amount: f64,
    (year, month, day): (i32, u32, u32),
) -> InvoiceRecord {
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default();
    InvoiceRecord {
        id: id.to_string(),
        reporting_year_id: reporting_year_id.to_string(),
        budget_allocation_id: None,
        competence_year: competence_year.to_string(),
        amount: Some(amount),
        date,
        created: DateTime::<Utc>::default(),
        donor_display_name: None,
    }
}
