//! Client and server under deterministic network simulation.

use std::time::Duration;

use reckon_client::{Client, ClientConfig, ClientError, SessionReport};
use reckon_core::{RandomCatalog, ServiceConfig, StaticCatalog};
use reckon_harness::{SIM_PORT, SimEnv, run_sim_server};
use reckon_proto::{Item, ItemA, ItemKinds};
use turmoil::net::TcpStream;

/// Helper to convert any error to Box<dyn Error>
fn to_box_err<E: std::error::Error + 'static>(e: E) -> Box<dyn std::error::Error> {
    Box::new(e)
}

async fn run_client(config: ClientConfig, env: SimEnv) -> Result<SessionReport, ClientError> {
    let stream = TcpStream::connect(("server", SIM_PORT))
        .await
        .map_err(|e| ClientError::Transport(e.into()))?;
    Client::new(stream, env).with_retry_delay(config.retry_delay).run(&config).await
}

fn batched_config(username: &str) -> ClientConfig {
    ClientConfig {
        username: username.to_string(),
        allowed_types: ItemKinds::A | ItemKinds::B,
        search_limit: 30,
        batch_size: 4,
        ..ClientConfig::default()
    }
}

/// Run one client session against a random-catalog server; returns the report.
fn simulate(seed: u64, config: ClientConfig) -> SessionReport {
    let report = std::sync::Arc::new(std::sync::Mutex::new(None));
    let captured = std::sync::Arc::clone(&report);

    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .rng_seed(seed)
        .build();

    sim.host("server", move || async move {
        let env = SimEnv::with_seed(seed);
        run_sim_server(RandomCatalog::new(env.clone()), env, ServiceConfig::default()).await
    });

    sim.client("client", async move {
        let result = run_client(config, SimEnv::with_seed(seed ^ 1)).await.map_err(to_box_err)?;
        *captured.lock().map_err(|e| e.to_string())? = Some(result);
        Ok(())
    });

    sim.run().expect("simulation should complete");
    let report = report.lock().expect("mutex poisoned").take();
    report.expect("client should have reported")
}

#[test]
fn default_session_over_simulated_network() {
    let report = simulate(11, ClientConfig { username: "alice".into(), ..ClientConfig::default() });
    assert!(report.summary.iter().all(|(kind, _)| kind == "ItemA"));
}

#[test]
fn batched_session_over_simulated_network() {
    let report = simulate(12, batched_config("bob"));
    assert!(report.revealed <= 30);
    assert!(report.summary.iter().all(|(kind, _)| kind == "ItemA" || kind == "ItemB"));
}

#[test]
fn same_seed_same_session() {
    let first = simulate(99, batched_config("carol"));
    let second = simulate(99, batched_config("carol"));
    assert_eq!(first, second);
}

#[test]
fn session_survives_latency_and_pending() {
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(300))
        .min_message_latency(Duration::from_millis(50))
        .max_message_latency(Duration::from_millis(50))
        .rng_seed(7)
        .build();

    let items: Vec<Item> = (0..12)
        .map(|i| Item::A(ItemA { field_x: format!("item{i}"), field_y: vec![i], field_z: Some(1) }))
        .collect();

    sim.host("server", move || {
        let items = items.clone();
        async move {
            // One fetch in two answers pending
            let config = ServiceConfig { pending_one_in: 2 };
            run_sim_server(StaticCatalog::new(items), SimEnv::with_seed(7), config).await
        }
    });

    sim.client("client", async {
        let config = ClientConfig { username: "dave".into(), ..ClientConfig::default() };
        let report = run_client(config, SimEnv::with_seed(8)).await.map_err(to_box_err)?;
        assert_eq!(report.revealed, 12);
        Ok(())
    });

    sim.run().expect("simulation should complete");
}

#[test]
fn concurrent_clients_get_separate_sessions() {
    let mut sim = turmoil::Builder::new().simulation_duration(Duration::from_secs(120)).build();

    sim.host("server", || async {
        let env = SimEnv::with_seed(5);
        run_sim_server(RandomCatalog::new(env.clone()), env, ServiceConfig::default()).await
    });

    for i in 0..3 {
        sim.client(format!("client{i}"), async move {
            run_client(batched_config(&format!("user{i}")), SimEnv::with_seed(i))
                .await
                .map_err(to_box_err)?;
            Ok(())
        });
    }

    sim.run().expect("simulation should complete");
}
