use crate::infra::{
    parse_date, parse_duration_unit, InMemoryEventPublisher, InMemoryProductCatalog,
    InMemoryRentalRepository, DEMO_OWNER_ID, DEMO_PRODUCT_ID,
};
use chrono::{Days, Local, NaiveDate};
use clap::Args;
use rental_engine::config::AppConfig;
use rental_engine::error::AppError;
use rental_engine::rentals::calendar::{find_conflict, CalendarImporter};
use rental_engine::rentals::validation::{LogisticsStep, ScheduleStep};
use rental_engine::rentals::{
    replay, DurationUnit, Pickup, PricingBreakdown, PricingPolicy, ProductId, RentalAction,
    RentalRequest, RentalService, RentalServiceError, RentalSubmission, TierMatch,
    UnavailabilityEntry, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AvailabilityArgs {
    /// Unavailability calendar CSV with `date,range_start,range_end` columns
    #[arg(long)]
    pub(crate) calendar: PathBuf,
    /// First day of the candidate rental (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: NaiveDate,
    /// Number of duration units
    #[arg(long, default_value_t = 1)]
    pub(crate) duration: u32,
    /// Duration unit: day, week, or month
    #[arg(long, default_value = "day", value_parser = parse_duration_unit)]
    pub(crate) unit: DurationUnit,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Rental start date (YYYY-MM-DD). Defaults to one week from today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Number of days to rent the demo product for
    #[arg(long, default_value_t = 3)]
    pub(crate) days: u32,
    /// Stop after approval instead of confirming the return
    #[arg(long)]
    pub(crate) skip_return: bool,
}

pub(crate) fn run_availability(args: AvailabilityArgs) -> Result<(), AppError> {
    let AvailabilityArgs {
        calendar,
        start,
        duration,
        unit,
    } = args;

    let calendar = CalendarImporter::from_path(&calendar)?;
    let end = unit
        .end_date(start, duration)
        .map(|date| date.to_string())
        .unwrap_or_else(|| "beyond the supported calendar".to_string());

    println!("Candidate rental: {start} to {end} ({duration} {}(s))", unit.label());
    println!("Calendar entries: {}", calendar.entries().len());

    match find_conflict(start, duration, unit, calendar.entries()) {
        Some(entry) => println!("Unavailable: overlaps {}", describe_entry(entry)),
        None => println!("Available"),
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        days,
        skip_return,
    } = args;

    let today = Local::now().date_naive();
    let start = start
        .or_else(|| today.checked_add_days(Days::new(7)))
        .unwrap_or(today);

    let catalog = Arc::new(InMemoryProductCatalog::seeded());
    let repository = Arc::new(InMemoryRentalRepository::default());
    let events = Arc::new(InMemoryEventPublisher::default());
    let config = AppConfig::load()?;
    let service = RentalService::new(
        catalog,
        repository,
        events.clone(),
        PricingPolicy::from(&config.pricing),
    );

    let product_id = ProductId(DEMO_PRODUCT_ID.to_string());
    let owner = UserId(DEMO_OWNER_ID.to_string());
    let renter = UserId("renter-demo".to_string());
    let product = service.product(&product_id)?;

    println!("Rental engine demo");
    println!("Product: {} ({})", product.title, product.id);

    let availability = service.check_availability(&product_id, start, days, DurationUnit::Day)?;
    if availability.conflict {
        println!(
            "Requested dates starting {start} are blocked; pick another --start date"
        );
        return Ok(());
    }

    let quote = service.quote(&product_id, days, DurationUnit::Day)?;
    render_quote(&quote, service.pricing());

    let submission = RentalSubmission {
        product_id,
        renter_id: renter.clone(),
        schedule: ScheduleStep {
            start_date: Some(start),
            duration: Some(days),
            duration_unit: DurationUnit::Day,
        },
        logistics: LogisticsStep {
            purpose: "Weekend camping trip".to_string(),
            pickup: Pickup::SelfPickup,
        },
    };

    let request = match service.submit(submission) {
        Ok(request) => request,
        Err(RentalServiceError::Validation(errors)) => {
            println!("Submission rejected:");
            for path in errors.paths() {
                for message in errors.get(path).unwrap_or_default() {
                    println!("  {path}: {message}");
                }
            }
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "\nSubmitted {} for {} to {}",
        request.id, request.start_date, request.end_date
    );

    let mut request = service.transition(&request.id, RentalAction::Approve, &owner, None)?;
    if !skip_return {
        request = service.transition(
            &request.id,
            RentalAction::Complete,
            &renter,
            Some("Returned dry and packed".to_string()),
        )?;
    }

    render_history(&request);
    println!("Events published: {}", events.events().len());

    Ok(())
}

fn render_quote(quote: &PricingBreakdown, pricing: &PricingPolicy) {
    println!(
        "\nQuote ({} x {} per {}{})",
        quote.duration,
        quote.tier.price,
        quote.tier.duration_unit.label(),
        if quote.tier_match == TierMatch::Fallback {
            ", fallback tier"
        } else {
            ""
        }
    );
    println!("  Base cost:        {:>8}", quote.base_cost);
    println!("  Security deposit: {:>8}", quote.security_deposit);
    println!("  Renter pays:      {:>8}", quote.renter_charge);
    println!(
        "  Service fee:      {:>8} ({:.2}%)",
        quote.service_fee,
        f64::from(pricing.service_fee_bps()) / 100.0
    );
    println!("  Owner receives:   {:>8}", quote.owner_payout);
}

fn render_history(request: &RentalRequest) {
    println!("\nStatus history for {}", request.id);
    for change in request.status_history() {
        let note = change
            .note
            .as_deref()
            .map(|note| format!(" ({note})"))
            .unwrap_or_default();
        println!(
            "  {} {:<9} by {}{}",
            change.at.format("%Y-%m-%d %H:%M:%S"),
            change.status.label(),
            change.actor.label(),
            note
        );
    }

    match replay(request.status_history()) {
        Ok(status) => println!("Replayed status: {}", status.label()),
        Err(err) => println!("History does not replay: {err}"),
    }
}

fn describe_entry(entry: &UnavailabilityEntry) -> String {
    match entry {
        UnavailabilityEntry::Date { date } => format!("blocked date {date}"),
        UnavailabilityEntry::Range { start, end } => format!("blocked range {start} to {end}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn describes_both_entry_forms() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid");
        assert_eq!(
            describe_entry(&UnavailabilityEntry::date(date)),
            "blocked date 2024-06-15"
        );
        let end = NaiveDate::from_ymd_opt(2024, 6, 18).expect("valid");
        assert_eq!(
            describe_entry(&UnavailabilityEntry::range(date, end).expect("ordered")),
            "blocked range 2024-06-15 to 2024-06-18"
        );
    }

    #[test]
    fn availability_reads_calendar_files() {
        let path = std::env::temp_dir().join(format!(
            "rental-engine-calendar-{}.csv",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).expect("create calendar");
        writeln!(file, "date,range_start,range_end").expect("write header");
        writeln!(file, "2024-06-15,,").expect("write row");
        drop(file);

        let result = run_availability(AvailabilityArgs {
            calendar: path.clone(),
            start: NaiveDate::from_ymd_opt(2024, 6, 14).expect("valid"),
            duration: 2,
            unit: DurationUnit::Day,
        });
        std::fs::remove_file(&path).ok();

        assert!(result.is_ok());
    }

    #[test]
    fn availability_surfaces_missing_calendars() {
        let result = run_availability(AvailabilityArgs {
            calendar: PathBuf::from("/nonexistent/rental-calendar.csv"),
            start: NaiveDate::from_ymd_opt(2024, 6, 14).expect("valid"),
            duration: 1,
            unit: DurationUnit::Day,
        });
        assert!(matches!(result, Err(AppError::Calendar(_))));
    }

    #[test]
    fn demo_runs_end_to_end() {
        let start = NaiveDate::from_ymd_opt(2031, 3, 2);
        assert!(run_demo(DemoArgs {
            start,
            days: 3,
            skip_return: false,
        })
        .is_ok());
    }
}
