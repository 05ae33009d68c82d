use std::env;
use std::io::{self, BufRead, Write};

use invoice_review::{Config, ExtractionClient, Product, Session, UploadEvent, render};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let config_path = env::var("INVOICE_REVIEW_CONFIG")
        .unwrap_or_else(|_| ".config/invoice_review.toml".to_string());
    let cfg = Config::load_or_default(&config_path)?;

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: invoice_review <invoice-file>");
        std::process::exit(2);
    };

    let client = ExtractionClient::new(&cfg.extractor.base_url);
    if !client.check_health().await {
        warn!(url = %cfg.extractor.base_url, "Health probe failed; submitting anyway");
    }

    let session = Session::new(client);
    let mut events = session.events();

    match submit(&session, &path) {
        Ok(()) => wait_for_outcome(&mut events).await,
        Err(e) => eprintln!("{e}"),
    }
    print_views(&session);

    repl(&session, &mut events).await?;

    let snapshot = session.snapshot();
    info!(
        products = snapshot.items.len(),
        upload_locked = session.upload_locked(),
        "Session closed"
    );
    Ok(())
}

/// Read the file and hand it to the session's upload control.
fn submit(session: &Session<ExtractionClient>, path: &str) -> invoice_review::Result<()> {
    let bytes = std::fs::read(path)?;
    let filename = std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    session.submit_file(filename, bytes)
}

/// Consume events until the running upload settles.
async fn wait_for_outcome(events: &mut broadcast::Receiver<UploadEvent>) {
    loop {
        match events.recv().await {
            Ok(UploadEvent::Started { filename }) => {
                info!(filename = %filename, "Upload started")
            }
            Ok(UploadEvent::Completed) => {
                println!("Invoice processed.");
                break;
            }
            Ok(UploadEvent::Failed { notice }) => {
                eprintln!("{notice}");
                break;
            }
            Ok(UploadEvent::Cancelled) => {
                println!("Upload cancelled.");
                break;
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_views(session: &Session<ExtractionClient>) {
    let snapshot = session.snapshot();
    println!();
    println!("{}", render::invoice_view(&snapshot));
    println!("{}", render::products_view(&snapshot));
    println!("{}", render::customer_view(&snapshot));
}

fn print_help() {
    println!("commands:");
    println!("  invoice | products | customer | show");
    println!("  edit <row> <name> <quantity> <unit-price> <tax> <price-with-tax> <discount>");
    println!("  delete <row>");
    println!("  upload <path>");
    println!("  quit");
}

/// Map a 1-based display row to the line item's id.
fn parse_row(session: &Session<ExtractionClient>, row: &str) -> Result<Uuid, String> {
    let n: usize = row
        .parse()
        .map_err(|_| format!("not a row number: {row}"))?;
    if n == 0 {
        return Err("rows start at 1".to_string());
    }
    session
        .snapshot()
        .item_at(n - 1)
        .map(|item| item.id)
        .ok_or_else(|| format!("no product at row {n}"))
}

fn parse_number(label: &str, value: &str) -> Result<f64, String> {
    value
        .parse()
        .map_err(|_| format!("{label} must be a number, got {value}"))
}

async fn repl(
    session: &Session<ExtractionClient>,
    events: &mut broadcast::Receiver<UploadEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    print_help();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["help"] => print_help(),
            ["invoice"] => println!("{}", render::invoice_view(&session.snapshot())),
            ["products"] => println!("{}", render::products_view(&session.snapshot())),
            ["customer"] => println!("{}", render::customer_view(&session.snapshot())),
            ["show"] => print_views(session),
            ["upload", path] => match submit(session, path) {
                Ok(()) => {
                    wait_for_outcome(events).await;
                    print_views(session);
                }
                Err(e) => eprintln!("{e}"),
            },
            ["delete", row] => match parse_row(session, row) {
                Ok(id) => match session.delete_product(id) {
                    Ok(snapshot) => {
                        println!("{}", render::products_view(&snapshot));
                        println!("{}", render::invoice_view(&snapshot));
                    }
                    Err(e) => eprintln!("{e}"),
                },
                Err(msg) => eprintln!("{msg}"),
            },
            ["edit", row, name, quantity, unit_price, tax, price_with_tax, discount] => {
                let command = parse_row(session, row).and_then(|id| {
                    Ok((
                        id,
                        Product {
                            name: name.to_string(),
                            quantity: parse_number("quantity", quantity)?,
                            unit_price: parse_number("unit price", unit_price)?,
                            tax: parse_number("tax", tax)?,
                            price_with_tax: parse_number("price with tax", price_with_tax)?,
                            discount: parse_number("discount", discount)?,
                        },
                    ))
                });
                match command {
                    Ok((id, product)) => match session.edit_product(id, product) {
                        Ok(snapshot) => {
                            println!("{}", render::products_view(&snapshot));
                            println!("{}", render::invoice_view(&snapshot));
                        }
                        Err(e) => eprintln!("{e}"),
                    },
                    Err(msg) => eprintln!("{msg}"),
                }
            }
            _ => eprintln!("unrecognized command; type 'help'"),
        }
    }
    Ok(())
}
