//! End-to-end tests against a local stand-in for the BrainQuiz backend

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse},
    routing::{delete, get, patch, post},
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use brainquiz_client::{
    Error,
    api::ApiClient,
    cache::ResponseCache,
    dispatcher::RequestDispatcher,
    error::GENERIC_SERVER_ERROR,
    fetch::Fetcher,
    models::{AuditLogQuery, NamedInput, QuestionInput, QuestionOptions, QuizInput, Resource},
    transport::HttpTransport,
};

#[derive(Default)]
struct Backend {
    category_reads: AtomicUsize,
    question_reads: AtomicUsize,
    grade_level_reads: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
    last_auth: Mutex<Option<String>>,
    last_query: Mutex<HashMap<String, String>>,
    reads: Mutex<HashMap<String, usize>>,
}

impl Backend {
    fn hit(&self, path: &str) -> usize {
        let mut reads = self.reads.lock();
        let n = reads.entry(path.to_string()).or_default();
        *n += 1;
        *n
    }

    fn reads(&self, path: &str) -> usize {
        self.reads.lock().get(path).copied().unwrap_or_default()
    }
}

async fn counted_read(State(backend): State<Arc<Backend>>, uri: Uri) -> Json<Value> {
    let n = backend.hit(uri.path());
    Json(json!({"success": true, "data": [], "read": n}))
}

async fn confirmed_write() -> Json<Value> {
    Json(json!({"success": true, "message": "OK"}))
}

async fn write_without_success_flag() -> Json<Value> {
    Json(json!({"data": {}}))
}

async fn list_categories(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    let n = backend.category_reads.fetch_add(1, Ordering::SeqCst) + 1;
    *backend.last_auth.lock() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({"success": true, "data": [{"ID": 1, "name": "Matematika"}], "read": n}))
}

async fn update_category(Path(id): Path<u64>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({"success": true, "data": {"ID": id, "name": body["name"]}}))
}

async fn delete_category_rejected(Path(_id): Path<u64>) -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"success": false, "message": "Akses ditolak"})),
    )
}

async fn list_education_tracks_broken() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, Html("<h1>Bad Gateway</h1>"))
}

async fn list_questions_empty(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.question_reads.fetch_add(1, Ordering::SeqCst);
    Json(json!({"success": false, "message": "Belum ada soal"}))
}

async fn list_grade_levels_slow(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.grade_level_reads.fetch_add(1, Ordering::SeqCst);
    let now = backend.current.fetch_add(1, Ordering::SeqCst) + 1;
    backend.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    backend.current.fetch_sub(1, Ordering::SeqCst);
    Json(json!({"success": true, "data": []}))
}

async fn join_by_code(Json(body): Json<Value>) -> impl IntoResponse {
    if body["join_code"] == "KELAS7A" {
        (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Berhasil bergabung"})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Kode kelas tidak valid"})),
        )
    }
}

async fn audit_logs(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.hit("/audit/logs");
    *backend.last_query.lock() = params;
    Json(json!({
        "success": true,
        "data": {
            "logs": [{
                "CreatedAt": "2024-05-01T10:00:00Z",
                "username": "admin",
                "action": "login",
                "ip_address": "127.0.0.1",
                "role": "admin",
                "status": "success"
            }],
            "pagination": {"page": 2, "limit": 5, "total": 6, "totalPages": 2}
        }
    }))
}

async fn spawn_backend() -> (SocketAddr, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/kategori/get-kategori", get(list_categories))
        .route("/kategori/update-kategori/{id}", patch(update_category))
        .route(
            "/kategori/delete-kategori/{id}",
            delete(delete_category_rejected),
        )
        .route("/kategori/add-kategori", post(write_without_success_flag))
        .route(
            "/pendidikan/get-pendidikan",
            get(list_education_tracks_broken),
        )
        .route("/tingkatan/add-tingkatan", post(confirmed_write))
        .route("/kelas/get-kelas", get(counted_read))
        .route("/kelas/get-kelas/{id}", get(counted_read))
        .route("/kelas/get-kelas-by-user", get(counted_read))
        .route("/kelas/delete-kelas/{id}", delete(confirmed_write))
        .route("/kuis/get-kuis", get(counted_read))
        .route("/kuis/filter-kuis", get(counted_read))
        .route("/kuis/add-kuis", post(confirmed_write))
        .route("/kuis/update-kuis/{id}", patch(confirmed_write))
        .route("/kuis/delete-kuis/{id}", delete(confirmed_write))
        .route("/soal/get-soal", get(list_questions_empty))
        .route("/soal/get-soal/{id}", get(counted_read))
        .route("/soal/add-soal", post(confirmed_write))
        .route("/soal/delete-soal/{id}", delete(confirmed_write))
        .route("/hasil-kuis/my-results", get(counted_read))
        .route("/tingkatan/get-tingkatan", get(list_grade_levels_slow))
        .route("/kelas/join-by-code", post(join_by_code))
        .route("/audit/logs", get(audit_logs))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn client(addr: SocketAddr, token: Option<&str>) -> ApiClient {
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    let fetcher = Fetcher::new(
        transport,
        RequestDispatcher::with_limits(3, Duration::from_millis(10)),
        Some(Arc::new(ResponseCache::new(Duration::from_secs(300)))),
    );
    ApiClient::new(fetcher, &format!("http://{addr}/"), token.map(str::to_string)).unwrap()
}

#[tokio::test]
async fn test_repeated_read_is_served_from_cache() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, Some("secret-token"));

    let first = client.list_categories().await.unwrap();
    let second = client.list_categories().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.category_reads.load(Ordering::SeqCst), 1);
    assert_eq!(
        backend.last_auth.lock().as_deref(),
        Some("Bearer secret-token")
    );
}

#[tokio::test]
async fn test_successful_update_invalidates_list() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.list_categories().await.unwrap();
    client.list_categories().await.unwrap();
    assert_eq!(backend.category_reads.load(Ordering::SeqCst), 1);

    let updated = client
        .update_category(1, &NamedInput::new("Fisika", "IPA"))
        .await
        .unwrap();
    assert_eq!(updated["data"]["name"], "Fisika");

    let after = client.list_categories().await.unwrap();
    assert_eq!(backend.category_reads.load(Ordering::SeqCst), 2);
    assert_eq!(after["read"], 2);
    assert_eq!(*backend.last_auth.lock(), None);
}

#[tokio::test]
async fn test_rejected_write_keeps_cache() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.list_categories().await.unwrap();
    let err = client.delete_category(1).await.unwrap_err();
    assert!(matches!(err, Error::Server { status: 403, ref message } if message == "Akses ditolak"));

    client.list_categories().await.unwrap();
    assert_eq!(backend.category_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_non_json_response_is_generic_error() {
    let (addr, _backend) = spawn_backend().await;
    let client = client(addr, None);

    let err = client.list(Resource::EducationTracks).await.unwrap_err();
    assert!(matches!(err, Error::InvalidResponse));
    assert_eq!(err.to_string(), GENERIC_SERVER_ERROR);
}

#[tokio::test]
async fn test_logical_failure_is_not_cached() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    for _ in 0..2 {
        let err = client.list_questions().await.unwrap_err();
        assert!(matches!(err, Error::Rejected(ref m) if m == "Belum ada soal"));
    }
    assert_eq!(backend.question_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_reads_respect_ceiling() {
    let (addr, backend) = spawn_backend().await;
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    // No cache: every call must reach the backend
    let fetcher = Fetcher::new(
        transport,
        RequestDispatcher::with_limits(3, Duration::from_millis(10)),
        None,
    );
    let client = ApiClient::new(fetcher, &format!("http://{addr}"), None).unwrap();

    let calls = (0..8).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.list_grade_levels().await })
    });
    for handle in calls.collect::<Vec<_>>() {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(backend.grade_level_reads.load(Ordering::SeqCst), 8);
    assert!(backend.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(client.fetcher().dispatcher().stats().peak_in_flight, 3);
}

#[tokio::test]
async fn test_join_class_reports_server_message() {
    let (addr, _backend) = spawn_backend().await;
    let client = client(addr, None);

    let ok = client.join_class(" KELAS7A ").await.unwrap();
    assert_eq!(ok["message"], "Berhasil bergabung");

    let err = client.join_class("NOPE").await.unwrap_err();
    assert_eq!(err.to_string(), "Kode kelas tidak valid");
    assert_eq!(err.status(), Some(400));

    assert!(matches!(
        client.join_class("  ").await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_audit_logs_query_and_decode() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    let page = client
        .audit_logs(&AuditLogQuery {
            page: Some(2),
            limit: Some(5),
            action: Some("login".to_string()),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.logs.len(), 1);
    assert_eq!(page.pagination.total_pages, 2);

    let query = backend.last_query.lock().clone();
    assert_eq!(query.get("page").map(String::as_str), Some("2"));
    assert_eq!(query.get("limit").map(String::as_str), Some("5"));
    assert_eq!(query.get("action").map(String::as_str), Some("login"));
    assert!(!query.contains_key("username"));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = client(addr, None);

    let err = client.list_categories().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_transport());
    assert_eq!(err.status(), None);
    assert!(client.fetcher().cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_write_without_success_flag_keeps_cache() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.list_categories().await.unwrap();
    let created = client
        .create_category(&NamedInput::new("Kimia", ""))
        .await
        .unwrap();
    assert_eq!(created, json!({"data": {}}));

    client.list_categories().await.unwrap();
    assert_eq!(backend.category_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_invalidates_list() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.list_grade_levels().await.unwrap();
    client.list_grade_levels().await.unwrap();
    assert_eq!(backend.grade_level_reads.load(Ordering::SeqCst), 1);

    client
        .create_grade_level(&NamedInput::new("Kelas 7", "SMP"))
        .await
        .unwrap();
    client.list_grade_levels().await.unwrap();
    assert_eq!(backend.grade_level_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_quiz_writes_invalidate_quiz_list() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);
    let quiz = QuizInput {
        title: "Pecahan".to_string(),
        description: String::new(),
        category_id: 1,
        grade_level_id: 2,
        class_id: 3,
        education_track_id: 4,
    };

    client.list_quizzes().await.unwrap();
    client.list_quizzes().await.unwrap();
    assert_eq!(backend.reads("/kuis/get-kuis"), 1);

    client.create_quiz(&quiz).await.unwrap();
    client.list_quizzes().await.unwrap();
    assert_eq!(backend.reads("/kuis/get-kuis"), 2);

    client.update_quiz(5, &quiz).await.unwrap();
    client.list_quizzes().await.unwrap();
    assert_eq!(backend.reads("/kuis/get-kuis"), 3);

    client.delete_quiz(5).await.unwrap();
    client.list_quizzes().await.unwrap();
    assert_eq!(backend.reads("/kuis/get-kuis"), 4);
}

#[tokio::test]
async fn test_question_writes_invalidate_questions_of_quiz() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.questions_by_quiz(3).await.unwrap();
    client.questions_by_quiz(3).await.unwrap();
    assert_eq!(backend.reads("/soal/get-soal/3"), 1);

    client.delete_question(9).await.unwrap();
    client.questions_by_quiz(3).await.unwrap();
    assert_eq!(backend.reads("/soal/get-soal/3"), 2);

    client
        .create_question(&QuestionInput {
            question: "1/2 + 1/4 = ?".to_string(),
            options: Some(QuestionOptions::Structured(json!(["3/4", "2/6"]))),
            correct_answer: "3/4".to_string(),
            quiz_id: 3,
        })
        .await
        .unwrap();
    client.questions_by_quiz(3).await.unwrap();
    assert_eq!(backend.reads("/soal/get-soal/3"), 3);
}

#[tokio::test]
async fn test_class_write_also_drops_class_detail() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    for _ in 0..2 {
        client.list_classes().await.unwrap();
        client.get_class(7).await.unwrap();
    }
    assert_eq!(backend.reads("/kelas/get-kelas"), 1);
    assert_eq!(backend.reads("/kelas/get-kelas/7"), 1);

    client.delete_class(7).await.unwrap();

    client.list_classes().await.unwrap();
    client.get_class(7).await.unwrap();
    assert_eq!(backend.reads("/kelas/get-kelas"), 2);
    assert_eq!(backend.reads("/kelas/get-kelas/7"), 2);
}

#[tokio::test]
async fn test_per_user_reads_are_never_cached() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, Some("student-token"));

    for _ in 0..2 {
        client.joined_classes().await.unwrap();
        client.quizzes_by_class(4).await.unwrap();
        client.my_results().await.unwrap();
        client
            .audit_logs(&AuditLogQuery::default())
            .await
            .unwrap();
    }

    assert_eq!(backend.reads("/kelas/get-kelas-by-user"), 2);
    assert_eq!(backend.reads("/kuis/filter-kuis"), 2);
    assert_eq!(backend.reads("/hasil-kuis/my-results"), 2);
    assert_eq!(backend.reads("/audit/logs"), 2);
    assert!(client.fetcher().cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_join_class_leaves_cached_reads_alone() {
    let (addr, backend) = spawn_backend().await;
    let client = client(addr, None);

    client.list_classes().await.unwrap();
    client.join_class("KELAS7A").await.unwrap();
    client.list_classes().await.unwrap();

    assert_eq!(backend.reads("/kelas/get-kelas"), 1);
    assert_eq!(client.fetcher().cache().unwrap().len(), 1);
}
