use anyhow::{Error, anyhow};
use cucumber::given;
use shellcache_backend::faulty::Fault;
use shellcache_core::NetworkError;

use crate::world::ShellWorld;

// =============================================================================
// Setup
// =============================================================================

#[given(expr = "the origin {string}")]
fn origin(world: &mut ShellWorld, origin_value: String) -> Result<(), Error> {
    world.origin = origin_value;
    Ok(())
}

#[given(expr = "the cache prefix {string}")]
fn cache_prefix(world: &mut ShellWorld, prefix: String) -> Result<(), Error> {
    world.prefix = prefix;
    Ok(())
}

#[given(expr = "the precache manifest {string}")]
fn precache_manifest(world: &mut ShellWorld, entries: String) -> Result<(), Error> {
    world.precache = entries
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();
    Ok(())
}

// =============================================================================
// Network
// =============================================================================

#[given(expr = "the network serves the shell of {string}")]
fn network_serves_shell(world: &mut ShellWorld, label: String) -> Result<(), Error> {
    world.serve_shell(&label)
}

#[given(expr = "the network serves {string} with body {string}")]
fn network_serves(world: &mut ShellWorld, path: String, body: String) -> Result<(), Error> {
    let url = world.url(&path)?;
    world.network.respond_ok(url.as_str(), &body);
    Ok(())
}

#[given(expr = "the network fails for {string}")]
fn network_fails(world: &mut ShellWorld, path: String) -> Result<(), Error> {
    let url = world.url(&path)?;
    world
        .network
        .fail(url.as_str(), NetworkError::Unavailable("connection reset".into()));
    Ok(())
}

#[given(expr = "the network is offline")]
fn network_offline(world: &mut ShellWorld) -> Result<(), Error> {
    world.network.go_offline();
    Ok(())
}

// =============================================================================
// Store
// =============================================================================

#[given(expr = "store {word} fails for namespace {string}")]
fn store_fails(world: &mut ShellWorld, operation: String, namespace: String) -> Result<(), Error> {
    let fault = match operation.as_str() {
        "read" => Fault::Read,
        "write" => Fault::Write,
        "delete" => Fault::Delete,
        "remove" => Fault::Remove,
        "list" => Fault::List,
        _ => return Err(anyhow!("Unknown store operation: {}", operation)),
    };
    world.store.fail(fault, &namespace);
    Ok(())
}

// =============================================================================
// Deployments and clients
// =============================================================================

#[given(expr = "generation {string} is deployed")]
async fn generation_deployed(world: &mut ShellWorld, generation: String) -> Result<(), Error> {
    world.deploy_active(&generation).await
}

#[given(expr = "{int} client(s) connected")]
fn clients_connected(world: &mut ShellWorld, count: usize) -> Result<(), Error> {
    for _ in 0..count {
        let id = world.clients.connect();
        world.connected.push(id);
    }
    Ok(())
}
