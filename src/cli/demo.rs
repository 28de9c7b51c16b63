use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use paneldeck::core_types::{ContentType, JsonMap};
use paneldeck::event_bus::{kinds, PanelEvent};
use paneldeck::filter_center::{matches_record, FilterSet};
use paneldeck::state_center::PanelDescriptor;
use paneldeck::PanelDeck;

use super::context::CliContext;
use super::filters::parse_filter_set;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Filters the filter panel broadcasts
    #[arg(long, default_value = r#"{"property":{"propertyType":"Residential"}}"#)]
    pub filters: String,

    /// Run against the configured storage directories instead of memory
    #[arg(long)]
    pub persist: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoReport {
    delivered: usize,
    received: Vec<Value>,
    active_filters: FilterSet,
    visible_records: Vec<Value>,
    data_panel_version: u64,
}

pub async fn cmd_demo(args: DemoArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let filters = parse_filter_set(&args.filters)?;
    let report = if args.persist {
        run_scenario(ctx.deck().await, &filters)?
    } else {
        run_scenario(&PanelDeck::in_memory(), &filters)?
    };

    emit(format, &report, || {
        format!(
            "filterPanel -> dataPanel: {} delivery(ies)\nactive filters: {}\nvisible records: {}",
            report.delivered,
            Value::from(report.active_filters.clone()),
            report.visible_records.len()
        )
    })
}

fn run_scenario(deck: &PanelDeck, filters: &FilterSet) -> Result<DemoReport> {
    let _filter_panel = deck.open_panel(
        PanelDescriptor::new("filterPanel", ContentType::Filter, "Filters"),
        JsonMap::new(),
    )?;
    let data_panel = deck.open_panel(
        PanelDescriptor::new("dataPanel", ContentType::Data, "Records"),
        JsonMap::new(),
    )?;

    let received = Arc::new(Mutex::new(Vec::<Value>::new()));
    let visible = Arc::new(Mutex::new(Vec::<Value>::new()));
    let subscription = {
        let received = received.clone();
        let visible = visible.clone();
        let center = deck.filters().clone();
        deck.bus().subscribe_filtered(
            |event: &PanelEvent| event.kind == kinds::FILTER && !event.is_from("dataPanel"),
            move |event: &PanelEvent| {
                received.lock().push(event.payload.clone());
                let active = center.active_filters();
                *visible.lock() = sample_records()
                    .into_iter()
                    .filter(|record| matches_record(&active, record))
                    .map(Value::Object)
                    .collect();
                Ok(())
            },
        )
    };

    let dispatch = deck.publish_filters("filterPanel", filters);
    let visible_records = visible.lock().clone();
    data_panel.update_state(as_map(json!({"visibleCount": visible_records.len()})));
    subscription.unsubscribe();

    let received = received.lock().clone();
    Ok(DemoReport {
        delivered: dispatch.delivered,
        received,
        active_filters: deck.filters().active_filters(),
        visible_records,
        data_panel_version: data_panel.version(),
    })
}

fn sample_records() -> Vec<JsonMap> {
    [
        json!({"id": 1, "propertyType": "Residential", "county": "Kent", "price": 250000}),
        json!({"id": 2, "propertyType": "Land", "county": "Essex", "price": 90000}),
        json!({"id": 3, "propertyType": "Residential", "county": "Essex", "price": 410000}),
        json!({"id": 4, "propertyType": "Commercial", "county": "Kent", "price": 1200000}),
    ]
    .into_iter()
    .map(as_map)
    .collect()
}

fn as_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}
