use std::{collections::HashMap, net::SocketAddr};

use metricsreader::{
    ClientConfig, Error, GraphiteReader, Pnp4NagiosReader, Timeout, TlsVerify,
    frame::{ColumnLabel, Label},
    graphite::RenderOptions,
    http,
    pnp4nagios::XportOptions,
};
use serde_json::json;
use time::OffsetDateTime;
use warp::{Filter, http::StatusCode};

type Query = HashMap<String, String>;

fn render(query: &Query) -> (String, StatusCode) {
    // Unset parameters must be left out, never sent empty.
    if query.values().any(String::is_empty) {
        return (String::new(), StatusCode::BAD_REQUEST);
    }
    match (query.get("target").map(String::as_str), query.get("format").map(String::as_str)) {
        (Some("servers.*.cpu.load"), Some("json")) => (
            json!([
                {"target": "servers.web1.cpu.load", "datapoints": [[0.5, 60], [null, 120]]},
                {"target": "servers.web2.cpu.load", "datapoints": [[1.5, 60], [2.5, 120]]},
            ])
            .to_string(),
            StatusCode::OK,
        ),
        (Some("servers.web1.cpu.load"), Some("csv")) => (
            "servers.web1.cpu.load,2020-01-01 00:00:00,0.5\n\
             servers.web1.cpu.load,2020-01-01 00:01:00,\n"
                .to_string(),
            StatusCode::OK,
        ),
        (Some("nothing"), _) => ("[]".to_string(), StatusCode::OK),
        (Some("secret"), _) => (String::new(), StatusCode::UNAUTHORIZED),
        _ => (String::new(), StatusCode::NOT_FOUND),
    }
}

fn find(query: &Query) -> (String, StatusCode) {
    let nodes = match query.get("query").map(String::as_str) {
        Some("*") => json!([{"id": "servers", "text": "servers", "leaf": 0, "allowChildren": 1}]),
        Some("servers.*") => json!([
            {"id": "servers.web1", "text": "web1", "leaf": 1, "allowChildren": 0},
            {"id": "servers.web2", "text": "web2", "leaf": 1, "allowChildren": 0},
        ]),
        _ => json!([]),
    };
    (nodes.to_string(), StatusCode::OK)
}

fn xport(query: &Query) -> (String, StatusCode) {
    if query.get("srv").map(String::as_str) != Some("load") {
        return (String::new(), StatusCode::NOT_FOUND);
    }
    let body = json!({
        "meta": {"legend": {"entry": ["load_1", "load_5"]}},
        "data": {"row": [
            {"t": "0", "v": ["0.5", "0.25"]},
            {"t": "1", "v": ["NaN", "1.0"]},
        ]},
    });
    (body.to_string(), StatusCode::OK)
}

fn reply((body, status): (String, StatusCode)) -> warp::reply::WithStatus<String> {
    warp::reply::with_status(body, status)
}

/// Serve a fake Graphite and PNP4Nagios host on a background runtime.
///
/// The blocking client must not run inside the runtime, so the server lives
/// on the runtime's worker threads and the test body on the test thread.
fn serve() -> (tokio::runtime::Runtime, SocketAddr) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let routes = warp::path!("render")
        .and(warp::query::<Query>())
        .map(|q: Query| reply(render(&q)))
        .or(warp::path!("metrics" / "find")
            .and(warp::query::<Query>())
            .map(|q: Query| reply(find(&q))))
        .or(warp::path!("pnp4nagios" / "xport" / "json")
            .and(warp::query::<Query>())
            .map(|q: Query| reply(xport(&q))));

    let addr = {
        let _guard = runtime.enter();
        let (addr, serve_fut) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        runtime.spawn(serve_fut);
        addr
    };
    (runtime, addr)
}

fn config(addr: SocketAddr, path: &str) -> ClientConfig {
    ClientConfig {
        url: format!("http://{addr}{path}"),
        tls_verify: TlsVerify::Enabled(true),
        timeout: Timeout::Split {
            connect: 2.0,
            read: 10.0,
        },
    }
}

fn hierarchical(components: &[&str]) -> ColumnLabel {
    ColumnLabel::Hierarchical(components.iter().copied().collect::<Label>())
}

#[test]
fn graphite_render_over_http() {
    let (_runtime, addr) = serve();
    let reader = GraphiteReader::new(&config(addr, "/")).unwrap();

    let frame = reader
        .read(&"servers.*.cpu.load".into(), &RenderOptions::default())
        .unwrap();

    let labels: Vec<&ColumnLabel> = frame.labels().collect();
    assert_eq!(labels, vec![&hierarchical(&["web1"]), &hierarchical(&["web2"])]);
    assert_eq!(
        frame.index(),
        &[
            OffsetDateTime::from_unix_timestamp(60).unwrap(),
            OffsetDateTime::from_unix_timestamp(120).unwrap(),
        ]
    );
    assert_eq!(
        frame.column(&hierarchical(&["web1"])).unwrap().values(),
        &[Some(0.5), None]
    );
}

#[test]
fn graphite_render_csv_over_http() {
    let (_runtime, addr) = serve();
    let reader = GraphiteReader::new(&config(addr, "/")).unwrap();
    let options = RenderOptions {
        format: metricsreader::graphite::Format::Csv,
        create_multiindex: false,
        ..RenderOptions::default()
    };

    let frame = reader.read(&"servers.web1.cpu.load".into(), &options).unwrap();

    assert_eq!(frame.len(), 2);
    let column = frame
        .column(&ColumnLabel::from("servers.web1.cpu.load"))
        .unwrap();
    assert_eq!(column.values(), &[Some(0.5), None]);
}

#[test]
fn graphite_walk_over_http() {
    let (_runtime, addr) = serve();
    let reader = GraphiteReader::new(&config(addr, "/")).unwrap();

    let steps = reader
        .walk(None, None, None)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].path, "");
    assert_eq!(steps[0].nodes, vec!["servers"]);
    assert_eq!(steps[1].path, "servers");
    assert_eq!(steps[1].leaves, vec!["servers.web1", "servers.web2"]);
}

#[test]
fn empty_render_is_reported() {
    let (_runtime, addr) = serve();
    let reader = GraphiteReader::new(&config(addr, "/")).unwrap();

    let err = reader
        .read(&"nothing".into(), &RenderOptions::default())
        .unwrap_err();

    assert_eq!(err.to_string(), "Received empty dataset for target nothing");
}

#[test]
fn pnp4nagios_xport_over_http() {
    let (_runtime, addr) = serve();
    let reader = Pnp4NagiosReader::new(&config(addr, "/")).unwrap();

    let frame = reader
        .read(&vec!["host1", "host2"].into(), "load", &XportOptions::default())
        .unwrap();

    assert_eq!(frame.len(), 2);
    assert_eq!(frame.width(), 4);
    assert_eq!(
        frame
            .column(&hierarchical(&["host1", "load", "1"]))
            .unwrap()
            .values(),
        &[Some(0.5), None]
    );
    assert_eq!(
        frame
            .column(&hierarchical(&["host2", "load", "5"]))
            .unwrap()
            .values(),
        &[Some(0.25), Some(1.0)]
    );
}

#[test]
fn error_status_carries_url_and_status() {
    let (_runtime, addr) = serve();
    // The render path is absolute and replaces the base path.
    let reader = GraphiteReader::new(&config(addr, "/graphite/")).unwrap();

    let err = reader
        .read(&"secret".into(), &RenderOptions::default())
        .unwrap_err();

    match err {
        Error::RequestFailed { url, status } => {
            assert_eq!(status, 401);
            assert!(url.starts_with(&format!("http://{addr}/render?")), "{url}");
            assert!(url.contains("target=secret"), "{url}");
            assert!(!url.contains("from="), "{url}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unreachable_host_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let reader = GraphiteReader::new(&config(addr, "/")).unwrap();

    let err = reader
        .read(&"a.b".into(), &RenderOptions::default())
        .unwrap_err();

    assert!(
        matches!(err, Error::Transport(http::Error::Reqwest(_))),
        "{err:?}"
    );
}
