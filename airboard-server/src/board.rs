//! Terminal rendering of departures and the airport directory.

use comfy_table::{Cell, Table};

use airboard_core::directory::AirportDirectory;
use airboard_core::feed::FeedSnapshot;
use airboard_core::types::AirportRecord;

/// Departures table for one airport, with a status line underneath.
pub fn render_board(airport: &AirportRecord, snapshot: &FeedSnapshot) -> String {
    let mut out = format!("Departures: {} ({})\n", airport.title, airport.code);

    if snapshot.records.is_empty() {
        if snapshot.is_refreshing {
            out.push_str("Loading departures...\n");
        } else {
            out.push_str("No upcoming departures.\n");
        }
        return out;
    }

    let mut table = Table::new();
    table.set_header(vec!["Flight", "To", "Time", "Est.", "Status", "Gate"]);
    for record in &snapshot.records {
        table.add_row(vec![
            Cell::new(record.display_code()),
            Cell::new(record.destination()),
            Cell::new(record.scheduled_clock()),
            Cell::new(record.estimated_clock()),
            Cell::new(record.status.label()),
            Cell::new(record.gate_info()),
        ]);
    }
    out.push_str(&format!("{table}\n"));

    let mut footer = format!("{} departures", snapshot.records.len());
    if snapshot.is_refreshing {
        footer.push_str(", refreshing");
    }
    if snapshot.is_loading {
        footer.push_str(", loading more");
    } else if snapshot.has_more {
        footer.push_str(", more available");
    }
    out.push_str(&footer);
    out.push('\n');
    out
}

pub fn render_airports(directory: &AirportDirectory) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Code", "Airport", "Lat", "Lon"]);
    for airport in directory.iter() {
        table.add_row(vec![
            Cell::new(&airport.code),
            Cell::new(&airport.title),
            Cell::new(format!("{:.4}", airport.latitude)),
            Cell::new(format!("{:.4}", airport.longitude)),
        ]);
    }
    format!("{table}")
}
