use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use paneldeck::core_types::{ContentType, JsonMap};
use paneldeck::durable_cache::{DurableCache, MemoryTier, StorageKeys, StorageTier};
use paneldeck::event_bus::{kinds, EventBus, InMemoryBus, PanelEvent};
use paneldeck::filter_center::{FilterCenter, FilterSet};
use paneldeck::panel_state::PersistOption;
use paneldeck::state_center::PanelDescriptor;
use paneldeck::PanelDeck;

fn set(value: Value) -> FilterSet {
    FilterSet::try_from(value).expect("object")
}

#[test]
fn filter_panel_broadcast_reaches_data_panel() {
    let deck = PanelDeck::in_memory();
    let received = Arc::new(Mutex::new(Vec::<(PanelEvent, FilterSet)>::new()));

    let _data_panel = deck
        .open_panel(
            PanelDescriptor::new("dataPanel", ContentType::Data, "Records"),
            JsonMap::new(),
        )
        .unwrap();
    let _subscription = {
        let received = received.clone();
        let center = deck.filters().clone();
        deck.bus().subscribe_fn(move |event: &PanelEvent| {
            if event.kind != kinds::FILTER || event.is_from("dataPanel") {
                return Ok(());
            }
            received.lock().push((event.clone(), center.active_filters()));
            Ok(())
        })
    };

    let filters = set(json!({"property": {"propertyType": "Residential"}}));
    deck.filters().merge_filters(&filters);
    deck.bus().publish(PanelEvent::new(
        kinds::FILTER,
        json!({"filters": {"property": {"propertyType": "Residential"}}}),
        "filterPanel",
    ));

    let received = received.lock();
    assert_eq!(received.len(), 1);
    let (event, active) = &received[0];
    assert_eq!(event.source, "filterPanel");
    assert_eq!(
        event.payload,
        json!({"filters": {"property": {"propertyType": "Residential"}}})
    );
    assert_eq!(
        Value::from(active.clone()),
        json!({"property": {"propertyType": "Residential"}})
    );
}

#[test]
fn self_originated_events_can_be_ignored_by_the_receiver() {
    let deck = PanelDeck::in_memory();
    let hits = Arc::new(Mutex::new(0usize));
    let counter = hits.clone();
    let _subscription = deck.bus().subscribe_filtered(
        |event: &PanelEvent| event.kind == kinds::FILTER && !event.is_from("dataPanel"),
        move |_event: &PanelEvent| {
            *counter.lock() += 1;
            Ok(())
        },
    );

    deck.publish_filters("dataPanel", &set(json!({"property": {"a": 1}})));
    deck.publish_filters("filterPanel", &set(json!({"geographic": {"b": 2}})));

    assert_eq!(*hits.lock(), 1);
    assert_eq!(
        Value::from(deck.filters().active_filters()),
        json!({"property": {"a": 1}, "geographic": {"b": 2}})
    );
}

#[test]
fn failing_subscriber_does_not_block_later_ones() {
    let bus: Arc<InMemoryBus> = InMemoryBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _failing = bus.subscribe_fn(|_event: &PanelEvent| {
        Err(paneldeck::core_types::DeckError::new("render failed"))
    });
    let sink = seen.clone();
    let _healthy = bus.subscribe_fn(move |event: &PanelEvent| {
        sink.lock().push(event.payload.clone());
        Ok(())
    });

    let report = bus.publish(PanelEvent::new(kinds::SELECTION, json!({"id": 7}), "mapPanel"));
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(*seen.lock(), vec![json!({"id": 7})]);
}

#[test]
fn filters_and_panels_survive_a_primary_tier_outage() {
    let primary = Arc::new(MemoryTier::new("local"));
    primary.fail_writes(true);
    let fallback = Arc::new(MemoryTier::new("session"));
    let cache = Arc::new(DurableCache::new(primary.clone(), fallback.clone()));
    let keys = StorageKeys::default();

    let deck = PanelDeck::with_cache(cache.clone(), keys.clone(), PersistOption::default());
    deck.filters()
        .apply_filters(set(json!({"geographic": {"county": "Kent"}})));
    {
        let panel = deck
            .open_panel(
                PanelDescriptor::new("mapPanel", ContentType::Map, "Map"),
                JsonMap::new(),
            )
            .unwrap();
        panel.update_state(match json!({"zoom": 9}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        });
    }

    assert!(primary.get_item(&keys.active_filters()).unwrap().is_none());
    assert!(fallback.get_item(&keys.active_filters()).unwrap().is_some());

    let restored = FilterCenter::open(cache, keys.clone());
    assert_eq!(
        Value::from(restored.active_filters()),
        json!({"geographic": {"county": "Kent"}})
    );
    let record = deck.panel_store().load_panel_state("mapPanel").unwrap();
    assert_eq!(record.state["zoom"], json!(9));
}
