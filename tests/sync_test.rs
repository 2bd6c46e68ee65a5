use serde_json::{Value, json};
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::tempdir;

const USER: &str = "alice";
const POSTS_PATH: &str = "/api/users/alice/posts";

#[derive(Default)]
struct AccountState {
    posts: Vec<Value>,
    requests: Vec<String>,
}

/// Minimal HTTP/1.1 account that understands the four post endpoints.
/// Stored posts get the fields a real server adds on write.
struct FakeAccount {
    url: String,
    state: Arc<Mutex<AccountState>>,
}

impl FakeAccount {
    fn start(posts: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake account");
        let url = format!("http://{}/api", listener.local_addr().expect("addr"));
        let state = Arc::new(Mutex::new(AccountState {
            posts,
            requests: Vec::new(),
        }));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                handle(stream, &shared);
            }
        });
        Self { url, state }
    }

    fn requests(&self) -> Vec<String> {
        self.state.lock().expect("lock").requests.clone()
    }

    fn clear_requests(&self) {
        self.state.lock().expect("lock").requests.clear();
    }

    fn posts(&self) -> Vec<Value> {
        self.state.lock().expect("lock").posts.clone()
    }
}

fn query_param(query: &str, name: &str) -> Option<usize> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.parse().ok())
}

fn with_server_fields(mut post: Value) -> Value {
    post["changeDate"] = json!("2024-06-01T12:00:00Z");
    post["date"] = json!("2024-06-01T12:00:00Z");
    post["groups"] = json!(["public"]);
    post
}

fn handle(stream: TcpStream, state: &Arc<Mutex<AccountState>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));

    let mut guard = state.lock().expect("lock");
    guard.requests.push(format!("{method} {path}"));
    let item_hash = path
        .strip_prefix(POSTS_PATH)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string);

    let (status, payload) = match (method.as_str(), item_hash) {
        ("GET", None) if path == POSTS_PATH => {
            let start = query_param(query, "start").unwrap_or(0);
            let end = query_param(query, "end").unwrap_or(start + 1000);
            let page = guard
                .posts
                .iter()
                .skip(start)
                .take(end.saturating_sub(start))
                .cloned()
                .collect::<Vec<_>>();
            (200, json!({ "posts": page }))
        }
        ("POST", None) if path == POSTS_PATH => {
            let envelope: Value = serde_json::from_slice(&body).expect("post body");
            let post = envelope["post"].clone();
            let hash = post["resource"]["intraHash"].clone();
            guard.posts.push(with_server_fields(post));
            (200, json!({ "resourcehash": hash }))
        }
        ("PUT", Some(hash)) => {
            let envelope: Value = serde_json::from_slice(&body).expect("put body");
            let replacement = with_server_fields(envelope["post"].clone());
            for post in guard.posts.iter_mut() {
                if post["resource"]["intraHash"] == json!(hash) {
                    *post = replacement.clone();
                }
            }
            (200, json!({ "resourcehash": hash }))
        }
        ("DELETE", Some(hash)) => {
            guard
                .posts
                .retain(|post| post["resource"]["intraHash"] != json!(hash));
            (200, json!({}))
        }
        _ => (404, json!({ "error": "not found" })),
    };
    drop(guard);

    let body = payload.to_string();
    let mut stream = stream;
    let _ = write!(
        stream,
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        if status == 200 { "OK" } else { "Not Found" },
        body.len()
    );
    let _ = stream.flush();
}

fn bibsync(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bibsync");
    cmd.current_dir(dir)
        .env("BIBSYNC_HOME", dir)
        .env("BIBSYNC_CONFIG_PATH", dir.join("missing.toml"))
        .env("BIBSYNC_REQUEST_TIMEOUT_SECS", "10")
        .env_remove("BIBSYNC_LOG")
        .env_remove("BIBSYNC_DRY_RUN")
        .env_remove("BIBSYNC_PAGE_SIZE");
    for proxy in ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"] {
        cmd.env_remove(proxy);
    }
    cmd
}

fn stale_post() -> Value {
    json!({
        "user": { "name": USER },
        "tags": ["old"],
        "resource": {
            "intraHash": "stale-hash",
            "entrytype": "article",
            "bibtexKey": "old01",
            "title": "A Paper Removed From The File"
        }
    })
}

const LIBRARY: &str = r#"
@article{doe19,
    author = {Jane Doe and John Roe},
    title = {Linked Data Quality},
    journal = {Semantic Web},
    year = 2019
}

@article{doe19again,
    author = {Jane Doe and John Roe},
    title = {Linked Data Quality},
    journal = {Semantic Web},
    year = 2019
}
"#;

fn count(requests: &[String], prefix: &str) -> usize {
    requests.iter().filter(|r| r.starts_with(prefix)).count()
}

#[test]
fn sync_adds_new_entries_and_removes_stale_ones() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let account = FakeAccount::start(vec![stale_post()]);

    bibsync(tmp.path())
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success();

    let requests = account.requests();
    assert_eq!(count(&requests, "GET"), 1);
    assert!(requests.contains(&format!("DELETE {POSTS_PATH}/stale-hash")));
    assert_eq!(count(&requests, "POST"), 1);
    assert_eq!(count(&requests, "PUT"), 0);

    let posts = account.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["user"]["name"], json!(USER));
    assert_eq!(posts[0]["tags"], json!(["nokeyword"]));
    assert_eq!(posts[0]["resource"]["title"], json!("Linked Data Quality"));
}

#[test]
fn sync_updates_changed_entries_and_ignores_server_fields() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let account = FakeAccount::start(Vec::new());

    bibsync(tmp.path())
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success();
    assert_eq!(count(&account.requests(), "POST"), 1);

    // Second run: the account copy now carries server fields only.
    account.clear_requests();
    bibsync(tmp.path())
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success();
    assert_eq!(account.requests(), vec![format!("GET {POSTS_PATH}")]);

    // Third run: keywords changed, identity unchanged.
    let tagged = LIBRARY.replacen("year = 2019\n", "year = 2019,\n    keywords = {rdf}\n", 1);
    fs::write(&bib, tagged).expect("rewrite bib");
    account.clear_requests();
    bibsync(tmp.path())
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success();
    let requests = account.requests();
    assert_eq!(count(&requests, "PUT"), 1);
    assert_eq!(count(&requests, "POST"), 0);
    assert_eq!(count(&requests, "DELETE"), 0);
    assert_eq!(account.posts()[0]["tags"], json!(["rdf"]));
}

#[test]
fn dry_run_only_reads_the_account() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let account = FakeAccount::start(vec![stale_post()]);

    bibsync(tmp.path())
        .arg("--dry-run")
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success()
        .stderr(predicates::str::contains("would be added"));

    assert_eq!(account.requests(), vec![format!("GET {POSTS_PATH}")]);
    assert_eq!(account.posts().len(), 1);
}

#[test]
fn unreachable_account_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/api", listener.local_addr().expect("addr"));
    drop(listener);

    bibsync(tmp.path())
        .args([USER, "secret", url.as_str()])
        .arg(&bib)
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to read posts of alice"));
}

#[test]
fn unreadable_account_post_does_not_abort_the_run() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let account = FakeAccount::start(vec![
        json!({
            "tags": ["x"],
            "resource": { "intraHash": "broken-hash", "title": "Broken", "authors": "not a list" }
        }),
        json!({
            "tags": null,
            "changeDate": "2024-06-01 12:00:00",
            "resource": { "intraHash": "null-tags", "title": null }
        }),
    ]);

    bibsync(tmp.path())
        .args([USER, "secret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success()
        .stderr(predicates::str::contains("skipping unreadable account post"));

    let requests = account.requests();
    assert!(requests.contains(&format!("DELETE {POSTS_PATH}/null-tags")));
    assert!(!requests.contains(&format!("DELETE {POSTS_PATH}/broken-hash")));
    assert_eq!(count(&requests, "POST"), 1);
}

#[test]
fn api_key_starting_with_hyphen_is_accepted() {
    let tmp = tempdir().expect("tempdir");
    let bib = tmp.path().join("library.bib");
    fs::write(&bib, LIBRARY).expect("write bib");
    let account = FakeAccount::start(Vec::new());

    bibsync(tmp.path())
        .args([USER, "-s3cret", account.url.as_str()])
        .arg(&bib)
        .assert()
        .success();

    assert_eq!(count(&account.requests(), "POST"), 1);
}
