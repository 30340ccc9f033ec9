use std::cell::RefCell;
use std::rc::Rc;

use returns_dashboard::api::{ApiError, ApiRequest, ApiResponse, Method, ReturnsClient, Transport};
use returns_dashboard::config::ClientConfig;
use returns_dashboard::model::{NewReturn, ReturnFilters, ReturnId, ReturnRecord, ReturnStatus};
use returns_dashboard::resource::ResourceState;
use returns_dashboard::returns::{ListOptions, RecommendationsFeed, ReturnCreator, ReturnsList};
use serde_json::{json, Value};

const LIST_URL: &str = "http://localhost:8000/api/v1/returns";

/// In-memory backend recording every request it receives.
struct FakeBackend {
    records: RefCell<Vec<Value>>,
    requests: RefCell<Vec<ApiRequest>>,
    fail_with: Option<ApiResponse>,
}

impl FakeBackend {
    fn new(records: Vec<Value>) -> Self {
        Self {
            records: RefCell::new(records),
            requests: RefCell::new(Vec::new()),
            fail_with: None,
        }
    }

    fn failing(status: u16, body: &str) -> Self {
        Self {
            fail_with: Some(ApiResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
            ..Self::new(Vec::new())
        }
    }

    fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn last_request(&self) -> ApiRequest {
        self.requests.borrow().last().cloned().expect("a request was sent")
    }
}

impl Transport for FakeBackend {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(response) = &self.fail_with {
            return Ok(response.clone());
        }

        let path = request
            .url
            .strip_prefix(LIST_URL)
            .expect("request to the returns endpoints");

        let body = match request.method {
            Method::Get if path.starts_with("/recommendations") => json!({
                "recommendations": [{
                    "title": "تقليل الطلب",
                    "title_en": "Reduce orders",
                    "description": "وصف",
                    "description_en": "Order less bread",
                    "priority": "high",
                    "savings": 120.0
                }]
            }),
            Method::Get => {
                let records = self.records.borrow();
                json!({
                    "data": *records,
                    "total": records.len(),
                    "page": 1,
                    "total_pages": 1
                })
            }
            Method::Put => {
                let id: ReturnId = path
                    .trim_start_matches('/')
                    .trim_end_matches("/status")
                    .parse()
                    .expect("return id");
                let status = request.body.as_ref().expect("status body")["status"].clone();
                let mut records = self.records.borrow_mut();
                let record = records
                    .iter_mut()
                    .find(|record| {
                        serde_json::from_value::<ReturnId>(record["id"].clone()).ok()
                            == Some(id.clone())
                    })
                    .expect("known record");
                record["status"] = status;
                record.clone()
            }
            Method::Post => {
                let mut created = request.body.clone().expect("create body");
                created["id"] = json!(self.records.borrow().len() + 1);
                created
            }
        };
        Ok(ApiResponse::json(200, &body))
    }
}

fn record(id: i64, status: &str, total_value: f64) -> Value {
    json!({
        "id": id,
        "return_number": format!("RET-{id:03}"),
        "date": "2026-10-01",
        "customer": "Bakery",
        "status": status,
        "total_value": total_value,
    })
}

fn client(backend: FakeBackend) -> ReturnsClient<FakeBackend> {
    ReturnsClient::with_transport(ClientConfig::default(), backend)
}

#[test]
fn list_request_encodes_filters_in_order() {
    let client = client(FakeBackend::new(vec![record(1, "pending", 10.0)]));
    let filters = ReturnFilters::paged(10, 0).with_status(ReturnStatus::Pending);

    let page = client.get_returns(&filters).expect("fetch returns");

    let request = client.transport().last_request();
    assert_eq!(request.method, Method::Get);
    assert_eq!(
        request.url,
        "http://localhost:8000/api/v1/returns?status=pending&limit=10&offset=0"
    );
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].return_number, "RET-001");
    assert_eq!(page.total, 1);
}

#[test]
fn blank_filters_are_omitted() {
    let client = client(FakeBackend::new(Vec::new()));
    let mut filters = ReturnFilters::default().with_search("  ");
    filters.facility_id = Some(String::new());

    client.get_returns(&filters).expect("fetch returns");

    assert_eq!(client.transport().last_request().url, LIST_URL);
}

#[test]
fn token_is_sent_as_bearer() {
    let config = ClientConfig::default().with_token(Some("secret".to_owned()));
    let client = ReturnsClient::with_transport(config, FakeBackend::new(Vec::new()));

    client.get_returns(&ReturnFilters::default()).expect("fetch returns");

    let headers = client.transport().last_request().headers;
    assert!(headers.contains(&("Authorization".to_owned(), "Bearer secret".to_owned())));
    assert!(headers.contains(&("Content-Type".to_owned(), "application/json".to_owned())));
}

#[test]
fn error_detail_becomes_message() {
    let client = client(FakeBackend::failing(400, r#"{"detail":"Invalid status"}"#));

    let err = client
        .update_return_status(&ReturnId::Number(1), ReturnStatus::Approved, None)
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 400, .. }));
    assert_eq!(err.to_string(), "Invalid status");
}

#[test]
fn error_without_detail_uses_status() {
    let client = client(FakeBackend::failing(503, "Service Unavailable"));

    let err = client.get_returns(&ReturnFilters::default()).unwrap_err();

    assert_eq!(err.to_string(), "HTTP error! status: 503");
}

#[test]
fn status_update_sends_notes() {
    let client = client(FakeBackend::new(vec![record(7, "pending", 5.0)]));

    client
        .update_return_status(
            &ReturnId::Number(7),
            ReturnStatus::Rejected,
            Some("Damaged on arrival"),
        )
        .expect("update status");

    let request = client.transport().last_request();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.url, format!("{LIST_URL}/7/status"));
    assert_eq!(
        request.body,
        Some(json!({"status": "rejected", "notes": "Damaged on arrival"}))
    );
}

#[test]
fn list_loads_on_creation_and_reloads_after_update() {
    let client = client(FakeBackend::new(vec![
        record(1, "pending", 10.0),
        record(2, "pending", 2.5),
    ]));
    let mut list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert_eq!(client.transport().request_count(), 1);
    assert_eq!(list.insights().pending_count, 2);

    assert!(list.update_status(&ReturnId::Number(1), ReturnStatus::Approved, None));

    // PUT followed by a full reload
    assert_eq!(client.transport().request_count(), 3);
    assert_eq!(list.returns()[0].status, ReturnStatus::Approved);
    assert_eq!(list.insights().pending_count, 1);
    assert_eq!(list.insights().total_value, 12.5);
    assert!(list.error().is_none());
}

#[test]
fn sparse_records_do_not_fail_the_page() {
    let client = client(FakeBackend::new(vec![
        json!({"return_number": "R1", "total_value": 5}),
        json!({"id": "a1b2", "status": "pending", "total_value": null}),
    ]));
    let list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert!(list.error().is_none());
    let returns: &[ReturnRecord] = list.returns();
    assert_eq!(returns.len(), 2);
    assert_eq!(returns[0].id, ReturnId::Number(0));
    assert_eq!(returns[1].id, ReturnId::from("a1b2"));
    assert_eq!(list.insights().total_value, 5.0);
    assert_eq!(list.insights().pending_count, 1);
}

#[test]
fn text_ids_address_the_status_endpoint() {
    let client = client(FakeBackend::new(vec![
        json!({"id": "a1b2", "status": "pending", "total_value": 3.0}),
    ]));
    let mut list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert!(list.update_status(&ReturnId::from("a1b2"), ReturnStatus::Approved, None));

    assert_eq!(
        client.transport().requests.borrow()[1].url,
        format!("{LIST_URL}/a1b2/status")
    );
    assert_eq!(list.returns()[0].status, ReturnStatus::Approved);
}

#[test]
fn identical_filters_do_not_reload() {
    let client = client(FakeBackend::new(vec![record(1, "pending", 1.0)]));
    let mut list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert!(!list.set_filters(ReturnFilters::paged(10, 0)));
    assert_eq!(client.transport().request_count(), 1);

    assert!(list.set_filters(ReturnFilters::paged(10, 0).with_status(ReturnStatus::Pending)));
    assert_eq!(client.transport().request_count(), 2);
}

#[test]
fn list_subscribers_see_each_transition() {
    let client = client(FakeBackend::new(vec![record(1, "pending", 1.0)]));
    let mut list = ReturnsList::new(
        &client,
        ReturnFilters::paged(10, 0),
        ListOptions { auto_load: false },
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    list.resource_mut().subscribe(move |state| {
        sink.borrow_mut().push(match state {
            ResourceState::Idle => "idle",
            ResourceState::Loading => "loading",
            ResourceState::Ready(_) => "ready",
            ResourceState::Failed(_) => "failed",
        })
    });

    list.reload();

    assert_eq!(*seen.borrow(), vec!["loading", "ready"]);
}

#[test]
fn list_without_auto_load_waits_for_reload() {
    let client = client(FakeBackend::new(vec![record(1, "pending", 1.0)]));
    let mut list = ReturnsList::new(
        &client,
        ReturnFilters::paged(10, 0),
        ListOptions { auto_load: false },
    );

    assert_eq!(client.transport().request_count(), 0);
    assert!(list.returns().is_empty());

    assert!(list.reload());
    assert_eq!(list.returns().len(), 1);
    assert_eq!(list.pagination().total, 1);
}

#[test]
fn search_and_paging_update_the_query() {
    let client = client(FakeBackend::new(Vec::new()));
    let mut list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert!(list.go_to_page(3));
    assert_eq!(client.transport().last_request().url, format!("{LIST_URL}?limit=10&offset=20"));

    assert!(list.search("bread"));
    assert_eq!(
        client.transport().last_request().url,
        format!("{LIST_URL}?search=bread&limit=10&offset=0")
    );

    assert!(list.filter_status(Some(ReturnStatus::Pending)));
    assert_eq!(
        client.transport().last_request().url,
        format!("{LIST_URL}?status=pending&search=bread&limit=10&offset=0")
    );
}

#[test]
fn reload_with_overrides_does_not_store_them() {
    let client = client(FakeBackend::new(Vec::new()));
    let mut list = ReturnsList::new(&client, ReturnFilters::paged(10, 0), ListOptions::default());

    assert!(list.reload_with(&ReturnFilters::default().with_status(ReturnStatus::Completed)));

    assert_eq!(
        client.transport().last_request().url,
        format!("{LIST_URL}?status=completed&limit=10&offset=0")
    );
    assert_eq!(list.filters(), &ReturnFilters::paged(10, 0));
}

#[test]
fn failed_update_keeps_error() {
    let client = client(FakeBackend::failing(409, r#"{"detail":"Already processed"}"#));
    let mut list = ReturnsList::new(
        &client,
        ReturnFilters::paged(10, 0),
        ListOptions { auto_load: false },
    );

    assert!(!list.update_status(&ReturnId::Number(1), ReturnStatus::Approved, None));
    assert_eq!(list.error(), Some("Already processed"));
    assert_eq!(client.transport().request_count(), 1);
}

#[test]
fn recommendations_always_hit_the_backend() {
    let client = client(FakeBackend::new(Vec::new()));
    let mut feed = RecommendationsFeed::new(&client);

    assert!(feed.fetch(false));
    assert_eq!(
        client.transport().last_request().url,
        format!("{LIST_URL}/recommendations")
    );
    assert!(feed.fetch(true));
    assert_eq!(
        client.transport().last_request().url,
        format!("{LIST_URL}/recommendations?force_refresh=true")
    );
    assert_eq!(client.transport().request_count(), 2);

    let recommendation = &feed.recommendations()[0];
    assert_eq!(recommendation.localized_title(false), "Reduce orders");
    assert_eq!(recommendation.localized_title(true), "تقليل الطلب");
    assert_eq!(recommendation.positive_savings(), Some(120.0));
}

#[test]
fn creator_stores_and_returns_errors() {
    let client = client(FakeBackend::failing(422, r#"{"detail":"Missing customer"}"#));
    let mut creator = ReturnCreator::new(&client);

    let err = creator.create(&NewReturn::default()).unwrap_err();

    assert_eq!(err.to_string(), "Missing customer");
    assert_eq!(creator.error(), Some("Missing customer"));
    assert!(!creator.is_loading());
}

#[test]
fn creator_posts_new_return() {
    let client = client(FakeBackend::new(Vec::new()));
    let mut creator = ReturnCreator::new(&client);
    let new_return = NewReturn {
        customer: Some("Bakery".to_owned()),
        ..NewReturn::default()
    };

    let created = creator.create(&new_return).expect("create return");

    let request = client.transport().last_request();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url, LIST_URL);
    assert_eq!(created["customer"], "Bakery");
    assert!(creator.error().is_none());
}
