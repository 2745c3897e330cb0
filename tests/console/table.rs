//! Server-driven table against an asynchronous backend.
//!
//! The fetch callback only enqueues requests; a separate task answers them,
//! sometimes out of order, the way a real network would.

use std::sync::Arc;

use adminkit::table::{
    Column, FetchRequest, FileStorage, SortKey, Storage, Table, ViewRow, visibility_key,
};
use adminkit::{AccessPolicy, Action, AuthState, Error, Identity, Provider, StaticSource};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Clone, Debug, Serialize)]
struct Order {
    id: u32,
    customer: String,
    status: String,
    amount: f64,
}

/// 95 orders living on the "server".
fn backend_rows() -> Vec<Order> {
    (1..=95)
        .map(|i| Order {
            id: i,
            customer: format!("customer-{i:03}"),
            status: if i % 3 == 0 { "refunded" } else { "paid" }.to_string(),
            amount: f64::from(i) * 1.5,
        })
        .collect()
}

/// What a backend does with a query: filter, sort, slice.
fn answer(request: &FetchRequest) -> (Vec<Order>, usize) {
    let query = &request.query;
    let needle = query.global_filter.to_lowercase();
    let mut rows: Vec<Order> = backend_rows()
        .into_iter()
        .filter(|o| needle.is_empty() || o.customer.contains(&needle))
        .filter(|o| {
            query
                .column_filters
                .get("status")
                .is_none_or(|s| s.contains(&o.status))
        })
        .collect();
    if let Some(key) = query.sorting.first()
        && key.column_id == "amount"
        && !key.is_ascending()
    {
        rows.reverse();
    }
    let total = rows.len();
    let start = query.pagination.page_index * query.pagination.page_size;
    let page = rows
        .into_iter()
        .skip(start)
        .take(query.pagination.page_size)
        .collect();
    (page, total)
}

fn columns() -> Vec<Column<Order>> {
    vec![
        Column::new("customer", "Customer"),
        Column::new("status", "Status"),
        Column::new("amount", "Amount")
            .cell(|v| format!("${:.2}", v.as_f64().unwrap_or_default())),
    ]
}

fn server_table(total: Option<usize>) -> (Table<Order>, mpsc::UnboundedReceiver<FetchRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let table = Table::builder(columns())
        .server(total, move |req| {
            let _ = tx.send(req.clone());
        })
        .build()
        .unwrap();
    (table, rx)
}

#[tokio::test]
async fn pages_through_a_remote_dataset() {
    let (mut table, mut rx) = server_table(None);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.query.pagination.page_index, 0);
    let (rows, total) = answer(&first);
    table.apply(first.seq, rows, Some(total)).unwrap();

    let view = table.view();
    assert_eq!(view.page.page_count, Some(10));
    assert_eq!(view.rows.len(), 10);
    assert!(view.page.can_last);

    assert!(table.last_page());
    let last = rx.recv().await.unwrap();
    assert_eq!(last.query.pagination.page_index, 9);
    let (rows, total) = answer(&last);
    table.apply(last.seq, rows, Some(total)).unwrap();

    let view = table.view();
    assert_eq!(view.rows.len(), 5);
    assert!(!view.page.can_next);
    assert!(matches!(
        table.set_page_index(10),
        Err(Error::PageOutOfRange { .. })
    ));
}

/// Typing quickly sends several queries; only the last answer lands.
#[tokio::test]
async fn out_of_order_answers_are_dropped() {
    let (mut table, mut rx) = server_table(Some(95));
    let _initial = rx.recv().await.unwrap();

    table.set_global_filter("customer-0");
    table.set_global_filter("customer-01");
    let slow = rx.recv().await.unwrap();
    let fast = rx.recv().await.unwrap();
    assert!(fast.seq > slow.seq);

    let (rows, total) = answer(&fast);
    table.apply(fast.seq, rows, Some(total)).unwrap();
    let (rows, total) = answer(&slow);
    assert!(matches!(
        table.apply(slow.seq, rows, Some(total)),
        Err(Error::StaleResponse { .. })
    ));

    // customer-010 .. customer-019
    assert_eq!(table.total(), Some(10));
    assert_eq!(table.rows().len(), 10);
    assert!(!table.is_loading());
}

#[tokio::test]
async fn filter_and_sort_travel_with_the_request() {
    let (mut table, mut rx) = server_table(Some(95));
    let _initial = rx.recv().await.unwrap();
    table.next_page();
    let _page = rx.recv().await.unwrap();

    table.toggle_sort("amount", false).unwrap();
    table.toggle_sort("amount", false).unwrap();
    table.toggle_filter_value("status", "refunded").unwrap();
    let mut latest = rx.recv().await.unwrap();
    while let Ok(next) = rx.try_recv() {
        latest = next;
    }

    assert_eq!(latest.query.pagination.page_index, 0);
    assert_eq!(latest.query.sorting, vec![SortKey::desc("amount")]);
    assert_eq!(latest.query.sort_params(), vec!["amount,desc"]);

    let wire = serde_json::to_value(&latest.query).unwrap();
    assert_eq!(wire["pagination"], json!({"pageIndex": 0, "pageSize": 10}));
    assert_eq!(wire["sorting"], json!(["amount,desc"]));
    assert_eq!(wire["columnFilters"], json!({"status": ["refunded"]}));

    let (rows, total) = answer(&latest);
    table.apply(latest.seq, rows, Some(total)).unwrap();
    assert_eq!(table.total(), Some(31));
    let view = table.view();
    match &view.rows[0] {
        ViewRow::Data { cells, .. } => {
            assert_eq!(cells[2].text, "$139.50");
        }
        other => panic!("expected data row, got {other:?}"),
    }
}

/// Hidden columns survive a "page reload" through on-disk storage.
#[test]
fn visibility_survives_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&path));
    let mut table = Table::builder(columns())
        .selectable(true)
        .persist("/orders", Arc::clone(&storage))
        .build()
        .unwrap();
    table.set_column_visibility("status", false).unwrap();
    drop(table);

    let reopened: Arc<dyn Storage> = Arc::new(FileStorage::new(&path));
    let table = Table::builder(columns())
        .selectable(true)
        .persist("/orders", reopened)
        .build()
        .unwrap();
    assert_eq!(table.visible_column_ids(), vec!["select", "customer", "amount"]);

    let key = visibility_key(
        "table-visibility",
        "/orders",
        &["select", "customer", "status", "amount"],
    );
    let stored: serde_json::Value =
        serde_json::from_str(&storage.get(&key).unwrap().unwrap()).unwrap();
    assert_eq!(
        stored,
        json!({"customer": true, "status": false, "amount": true})
    );
}

/// Row actions follow the permissions of the page the table sits on.
#[tokio::test]
async fn row_actions_follow_page_permissions() {
    let source = StaticSource::new(json!([{
        "url": "/orders",
        "rolePermissions": {
            "ROLE_SUPPORT": {"read": true, "update": true}
        }
    }]));
    let provider = Provider::new(source, AccessPolicy::default());
    provider.set_auth(AuthState::SignedIn(Identity::new("s1", ["ROLE_SUPPORT"])));
    provider.ready().await;
    provider.navigate("/orders");

    let mut table = Table::builder(columns())
        .selectable(provider.has(Action::Delete))
        .expansion(|o: &Order| format!("Order #{} for {}", o.id, o.customer))
        .rows(backend_rows())
        .build()
        .unwrap();

    assert!(!table.visible_column_ids().contains(&"select"));
    table.toggle_expanded("3");
    let view = table.view();
    assert!(matches!(
        &view.rows[3],
        ViewRow::Expansion { content, colspan: 4, .. } if content == "Order #3 for customer-003"
    ));
}
