mod app;
mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;
mod ui;

use anyhow::Context;
use app::{App, Screen};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use datasources::OpenWeatherMapClient;
use db::Database;
use logic::eligibility::NoForecast;
use logic::{EligibilityRefresher, ForecastProvider, IrrigationLedger, Receipt, RetryPolicy};
use models::{format_money, Geometry, ZoneId};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use ui::screens::{OutlookScreen, PlannerScreen, ReportScreen};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Init) = cli.command {
        Config::setup_interactive()?;
        return Ok(());
    }

    let config = if cli.command.is_none() && !Config::exists(cli.config.as_ref()) {
        let (config, _) = Config::setup_interactive()?;
        config
    } else {
        Config::load(cli.config.clone()).context("Failed to load configuration")?
    };

    let db = Database::open(cli.data_dir.as_ref()).context("Failed to open plan database")?;

    let client = match config.active_openweathermap() {
        Some(owm) => Some(
            OpenWeatherMapClient::new(owm.clone(), &config.forecast)
                .context("Failed to build forecast client")?,
        ),
        None => {
            tracing::warn!("OpenWeatherMap not configured, zone eligibility stays unverified");
            None
        }
    };

    match cli.command {
        Some(Commands::Init) => Ok(()),
        Some(Commands::Check) => run_check(&config, &db, client.as_ref()).await,
        Some(Commands::Add { date, geometry }) => {
            let mut ledger = open_ledger(&config, &db, date)?;
            let geometry = Geometry::parse(&geometry.join(" "))?;
            let id = {
                let zone = ledger.add_zone(geometry)?;
                println!(
                    "{} added: {} ({:.2} m²)",
                    zone.label,
                    zone.geometry.describe(),
                    zone.area_square_meters
                );
                zone.id
            };

            refresh_zone(&mut ledger, id, client.as_ref(), &config).await;
            ledger.save(&db)?;
            print_zone_line(&ledger, id, &config);
            println!(
                "Total Cost: {}",
                format_money(&config.plantation.currency, ledger.total_cost())
            );
            Ok(())
        }
        Some(Commands::Toggle { date, zone }) => {
            let mut ledger = open_ledger(&config, &db, date)?;
            let id = zone
                .checked_sub(1)
                .and_then(|i| ledger.zones().get(i))
                .map(|z| z.id)
                .with_context(|| {
                    format!(
                        "No zone #{} on {} ({} zones)",
                        zone,
                        ledger.date(),
                        ledger.zones().len()
                    )
                })?;

            refresh_zone(&mut ledger, id, client.as_ref(), &config).await;
            let watering = ledger.toggle_watering(id)?;
            ledger.save(&db)?;

            print_zone_line(&ledger, id, &config);
            println!("Watering {}", if watering { "on" } else { "off" });
            println!(
                "Total Cost: {}",
                format_money(&config.plantation.currency, ledger.total_cost())
            );
            Ok(())
        }
        Some(Commands::Report {
            date,
            whatsapp,
            output,
        }) => {
            let mut ledger = open_ledger(&config, &db, date)?;
            match client {
                Some(client) => refresh_all_zones(&mut ledger, client, &config).await,
                None => eprintln!("Warning: no forecast provider, eligibility is unverified"),
            }
            if ledger.is_dirty() {
                ledger.save(&db)?;
            }

            let receipt = Receipt::from_summary(
                ledger.summary(&config.plantation.name, &config.plantation.currency),
                config.plantation.operator.clone(),
            );
            print!("{}", receipt.render_document());

            if let Some(dir) = output {
                let path = receipt.write_to(&dir)?;
                println!();
                println!("Receipt written to {}", path.display());
            }

            if whatsapp {
                let phone = config
                    .export
                    .whatsapp_phone
                    .as_deref()
                    .context("Set export.whatsapp_phone in config to send to the admin")?;
                println!();
                println!("{}", receipt.whatsapp_link(phone)?);
            }
            Ok(())
        }
        Some(Commands::Outlook) => {
            let client = client.context("OpenWeatherMap is not configured")?;
            run_outlook(&config, &client).await
        }
        None => {
            let refresher =
                client.map(|c| EligibilityRefresher::new(c, config.forecast.retry_policy()));
            run_tui(config, db, cli.data_dir, refresher).await
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn open_ledger(
    config: &Config,
    db: &Database,
    date: Option<chrono::NaiveDate>,
) -> error::Result<IrrigationLedger> {
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut ledger = IrrigationLedger::new(date, config.plantation.cost_per_square_meter);
    ledger.select_date(date, db)?;
    Ok(ledger)
}

/// Check a zone's forecast. Failures leave the zone unverified.
async fn refresh_zone(
    ledger: &mut IrrigationLedger,
    id: ZoneId,
    client: Option<&OpenWeatherMapClient>,
    config: &Config,
) {
    let result = match client {
        Some(client) => refresh_with(ledger, id, client, &config.forecast.retry_policy()).await,
        None => {
            let once = RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            };
            refresh_with(ledger, id, &NoForecast, &once).await
        }
    };

    if let Err(e) = result {
        let label = ledger
            .zone(id)
            .map(|z| z.label.clone())
            .unwrap_or_default();
        tracing::warn!(zone = %label, error = %e, "Forecast check failed");
        eprintln!("Warning: {}: {}", label, e);
    }
}

/// Check every zone of the plan concurrently and apply results as they land.
async fn refresh_all_zones(
    ledger: &mut IrrigationLedger,
    client: OpenWeatherMapClient,
    config: &Config,
) {
    let mut refresher = EligibilityRefresher::new(client, config.forecast.retry_policy());
    refresher.request_all(ledger.zones(), ledger.date());
    tracing::debug!(pending = refresher.pending(), "Waiting for zone forecasts");

    while let Some(outcome) = refresher.next().await {
        if let Err(e) = ledger.apply_forecast(outcome.zone_id, outcome.date, outcome.result) {
            let label = ledger
                .zone(outcome.zone_id)
                .map(|z| z.label.clone())
                .unwrap_or_default();
            tracing::warn!(zone = %label, error = %e, "Forecast check failed");
            eprintln!("Warning: {}: {}", label, e);
        }
    }
}

async fn refresh_with<P: ForecastProvider>(
    ledger: &mut IrrigationLedger,
    id: ZoneId,
    provider: &P,
    retry: &RetryPolicy,
) -> error::Result<()> {
    ledger.refresh_eligibility(id, provider, retry).await.map(|_| ())
}

fn print_zone_line(ledger: &IrrigationLedger, id: ZoneId, config: &Config) {
    let Some(zone) = ledger.zone(id) else {
        return;
    };
    let forecast = match zone.eligibility_on(ledger.date()) {
        models::Eligibility::RainBlocked => "rain expected, watering blocked",
        models::Eligibility::Eligible => "dry",
        models::Eligibility::Unverified => "unverified",
    };
    println!(
        "{}: {} | forecast {} | watering {} | {}",
        zone.label,
        zone.kind().as_str(),
        forecast,
        if zone.watering_enabled { "on" } else { "off" },
        format_money(
            &config.plantation.currency,
            zone.billable_cost(ledger.cost_per_square_meter())
        )
    );
}

async fn run_check(
    config: &Config,
    db: &Database,
    client: Option<&OpenWeatherMapClient>,
) -> anyhow::Result<()> {
    println!("Plantation: {}", config.plantation.name);
    println!(
        "Location: {:.4}, {:.4}",
        config.plantation.latitude, config.plantation.longitude
    );
    println!("Database: {}", db.path().display());

    let dates = db.list_plan_dates()?;
    println!("Saved plans: {}", dates.len());

    match client {
        Some(client) => match client.test_connection(config.plantation_center()).await {
            Ok(true) => println!("OpenWeatherMap: OK"),
            Ok(false) => println!("OpenWeatherMap: no forecast data"),
            Err(e) => println!("OpenWeatherMap: FAILED ({})", e),
        },
        None => println!("OpenWeatherMap: not configured"),
    }
    Ok(())
}

async fn run_outlook(config: &Config, client: &OpenWeatherMapClient) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let days = client
        .daily_outlook(config.plantation_center(), today, config.forecast.outlook_days)
        .await?;
    let thresholds = config.forecast.rain_thresholds();

    println!(
        "{:<4} {:<10} {:<14} {:>6} {:>8} {:>10} {:>9}  {}",
        "Day", "Date", "Weather", "Rain%", "Rain mm", "High/Low", "Humidity", "Watering"
    );
    for day in &days {
        let verdict = day.rain_verdict(&thresholds);
        println!(
            "{:<4} {:<10} {:<14} {:>5.0}% {:>8.1} {:>4.0}/{:<4.0}°C {:>8.0}%  {}",
            day.date.format("%a"),
            day.date,
            day.dominant_condition.as_str(),
            day.max_precipitation_prob * 100.0,
            day.total_precipitation_mm,
            day.high_temp_c,
            day.low_temp_c,
            day.avg_humidity,
            if verdict.rain_expected { "Blocked" } else { "OK" }
        );
    }
    Ok(())
}

async fn run_tui(
    config: Config,
    db: Database,
    data_dir: Option<std::path::PathBuf>,
    refresher: Option<EligibilityRefresher<OpenWeatherMapClient>>,
) -> anyhow::Result<()> {
    let mut app = App::new(config, db, data_dir, refresher)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if app.ledger.is_dirty() {
        app.ledger
            .save(&app.db)
            .context("Failed to save plan on exit")?;
    }

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| {
            let area = f.area();

            match app.screen {
                Screen::Planner => {
                    let input = app
                        .planner_state
                        .editing
                        .then_some(app.planner_state.edit_buffer.as_str());
                    let screen = PlannerScreen::new(
                        &app.ledger,
                        &app.config.plantation.name,
                        &app.config.plantation.currency,
                        &app.pending_zones,
                    )
                    .with_selection(app.planner_state.selected_index)
                    .editing(input)
                    .with_status(app.status_message.as_deref())
                    .with_provider(app.has_forecast_provider());
                    f.render_widget(screen, area);
                }
                Screen::Outlook => {
                    let screen = OutlookScreen::new(
                        &app.outlook,
                        app.config.forecast.rain_thresholds(),
                        app.ledger.date(),
                    )
                    .updated_at(app.outlook_updated)
                    .with_status(app.status_message.as_deref());
                    f.render_widget(screen, area);
                }
                Screen::Report => {
                    let receipt = app.receipt();
                    let screen = ReportScreen::new(&receipt)
                        .with_link(app.whatsapp_link.as_deref())
                        .with_status(app.status_message.as_deref());
                    f.render_widget(screen, area);
                }
            }
        })?;

        // Handle input with timeout so forecast results keep flowing in
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        app.poll_forecasts();

        if app.needs_outlook_refresh {
            app.refresh_outlook().await;
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    let editing = app.planner_state.editing;

    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('q') if !editing => app.quit(),
        KeyCode::Esc if !editing => app.switch_screen(Screen::Planner),
        KeyCode::Char(c) if !editing && Screen::from_key(c).is_some() => {
            if let Some(screen) = Screen::from_key(c) {
                app.switch_screen(screen);
            }
        }
        _ => match app.screen {
            Screen::Planner => handle_planner_input(app, code, modifiers),
            Screen::Outlook => handle_outlook_input(app, code),
            Screen::Report => handle_report_input(app, code),
        },
    }
}

fn handle_planner_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    if app.planner_state.editing {
        match code {
            KeyCode::Esc => app.planner_state.cancel_editing(),
            KeyCode::Enter => {
                let input = app.planner_state.finish_editing();
                app.add_zone_from_input(&input);
            }
            KeyCode::Backspace => {
                app.planner_state.edit_buffer.pop();
            }
            KeyCode::Char(c) => app.planner_state.edit_buffer.push(c),
            _ => {}
        }
        return;
    }

    let count = app.ledger.zones().len();
    match code {
        KeyCode::Up => app.planner_state.prev(),
        KeyCode::Down => app.planner_state.next(count),
        KeyCode::Char(' ') => app.toggle_selected(),
        KeyCode::Char('a') => app.planner_state.start_editing(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Left => app.shift_date(-1),
        KeyCode::Right => app.shift_date(1),
        KeyCode::Char('t') => app.go_today(),
        KeyCode::Char('r') => app.refresh_all(),
        KeyCode::Char('s') if modifiers.contains(KeyModifiers::CONTROL) => app.save(),
        KeyCode::Char('e') => app.export_receipt(),
        KeyCode::Char('w') => app.build_whatsapp_link(),
        _ => {}
    }
}

fn handle_outlook_input(app: &mut App, code: KeyCode) {
    if let KeyCode::Char('r') = code {
        app.request_outlook_refresh();
    }
}

fn handle_report_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('e') => app.export_receipt(),
        KeyCode::Char('w') => app.build_whatsapp_link(),
        _ => {}
    }
}
