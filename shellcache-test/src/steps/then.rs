use anyhow::{Error, anyhow};
use cucumber::then;
use pretty_assertions::assert_eq;
use shellcache::{
    ActivationError, CoordinatorError, FetchOutcome, GenerationId, InstallError, ResponseSource,
};

use crate::world::ShellWorld;

// =============================================================================
// Registry
// =============================================================================

#[then(expr = "the current generation is {string}")]
fn current_generation(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let actual = world.registry.current_generation();
    if actual != Some(GenerationId::new(expected.as_str())) {
        return Err(anyhow!(
            "Expected current generation {}, got {:?}",
            expected,
            actual
        ));
    }
    Ok(())
}

#[then(expr = "no generation is pending")]
fn nothing_pending(world: &mut ShellWorld) -> Result<(), Error> {
    match world.registry.pending() {
        None => Ok(()),
        Some(pending) => Err(anyhow!("Expected nothing pending, got {}", pending)),
    }
}

#[then(expr = "generation {string} is pending")]
fn generation_pending(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let actual = world.registry.pending();
    if actual != Some(GenerationId::new(expected.as_str())) {
        return Err(anyhow!("Expected {} pending, got {:?}", expected, actual));
    }
    Ok(())
}

#[then(expr = "the known generations are {string}")]
fn known_generations(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let actual: Vec<String> = world
        .registry
        .all_known_generations()
        .iter()
        .map(|g| g.to_string())
        .collect();
    assert_eq!(actual, split_list(&expected));
    Ok(())
}

// =============================================================================
// Install and activation
// =============================================================================

#[then(expr = "the activation fails in the store")]
fn activation_fails_in_store(world: &mut ShellWorld) -> Result<(), Error> {
    match &world.error {
        Some(CoordinatorError::Activation(ActivationError::Store(_))) => Ok(()),
        other => Err(anyhow!("Expected a store failure, got {:?}", other)),
    }
}

#[then(expr = "the install fails for entry {string}")]
fn install_fails_for(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    match &world.error {
        Some(CoordinatorError::Install(InstallError::MissingEntry { entry, .. }))
            if entry.as_str() == expected =>
        {
            Ok(())
        }
        other => Err(anyhow!(
            "Expected install to fail for {}, got {:?}",
            expected,
            other
        )),
    }
}

#[then(expr = "the last step succeeded")]
fn last_step_succeeded(world: &mut ShellWorld) -> Result<(), Error> {
    match &world.error {
        None => Ok(()),
        Some(error) => Err(anyhow!("Expected success, got {}", error)),
    }
}

// =============================================================================
// Store
// =============================================================================

#[then(expr = "the store holds namespaces {string}")]
async fn store_holds(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let mut expected = split_list(&expected);
    expected.sort();
    assert_eq!(world.namespaces().await?, expected);
    Ok(())
}

#[then(expr = "the store holds no namespaces")]
async fn store_empty(world: &mut ShellWorld) -> Result<(), Error> {
    let namespaces = world.namespaces().await?;
    if !namespaces.is_empty() {
        return Err(anyhow!("Expected no namespaces, found {:?}", namespaces));
    }
    Ok(())
}

#[then(expr = "no namespace exists for generation {string}")]
async fn no_namespace_for(world: &mut ShellWorld, generation: String) -> Result<(), Error> {
    let marker = format!(":{generation}:");
    let namespaces = world.namespaces().await?;
    if let Some(found) = namespaces.iter().find(|ns| ns.contains(&marker)) {
        return Err(anyhow!("Expected no namespace for {}, found {}", generation, found));
    }
    Ok(())
}

// =============================================================================
// Responses
// =============================================================================

#[then(expr = "the response body is {string}")]
fn response_body(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let served = world
        .outcome()?
        .response()
        .ok_or_else(|| anyhow!("No response available"))?;
    let body = String::from_utf8_lossy(served.response.body());
    if body != expected {
        return Err(anyhow!(
            "Response body {:?} does not match expected {:?}",
            body,
            expected
        ));
    }
    Ok(())
}

#[then(expr = "the response status is {int}")]
fn response_status(world: &mut ShellWorld, status: u16) -> Result<(), Error> {
    let served = world
        .outcome()?
        .response()
        .ok_or_else(|| anyhow!("No response available"))?;
    let actual = served.response.status().as_u16();
    if actual != status {
        return Err(anyhow!(
            "Response status {} does not match expected {}",
            actual,
            status
        ));
    }
    Ok(())
}

#[then(expr = "the response comes from the network")]
fn response_from_network(world: &mut ShellWorld) -> Result<(), Error> {
    expect_source(world, ResponseSource::Network)
}

#[then(expr = "the response comes from cache namespace {string}")]
fn response_from_cache(world: &mut ShellWorld, namespace: String) -> Result<(), Error> {
    expect_source(world, ResponseSource::Cache(namespace.into()))
}

#[then(expr = "the response is the fallback from {string}")]
fn response_fallback(world: &mut ShellWorld, namespace: String) -> Result<(), Error> {
    expect_source(world, ResponseSource::Fallback(namespace.into()))
}

#[then(expr = "the request fails")]
fn request_fails(world: &mut ShellWorld) -> Result<(), Error> {
    match world.outcome()? {
        FetchOutcome::Fail(_) => Ok(()),
        other => Err(anyhow!("Expected the request to fail, got {:?}", other)),
    }
}

#[then(expr = "the request passes through")]
fn request_passes_through(world: &mut ShellWorld) -> Result<(), Error> {
    if !world.outcome()?.is_pass_through() {
        return Err(anyhow!(
            "Expected pass-through, got {:?}",
            world.outcome()?
        ));
    }
    Ok(())
}

#[then(expr = "the network was called {int} time(s) for {string}")]
fn network_called(world: &mut ShellWorld, expected: usize, path: String) -> Result<(), Error> {
    let url = world.url(&path)?;
    let actual = world.network.calls_to(url.as_str());
    if actual != expected {
        return Err(anyhow!(
            "Expected {} call(s) to {}, got {}",
            expected,
            path,
            actual
        ));
    }
    Ok(())
}

#[then(expr = "the network was not called")]
fn network_not_called(world: &mut ShellWorld) -> Result<(), Error> {
    let actual = world.network.total_calls();
    if actual != 0 {
        return Err(anyhow!(
            "Expected the network to not be called, but was called {} time(s)",
            actual
        ));
    }
    Ok(())
}

// =============================================================================
// Clients
// =============================================================================

#[then(expr = "every client is controlled by {string}")]
fn clients_controlled_by(world: &mut ShellWorld, expected: String) -> Result<(), Error> {
    let expected = GenerationId::new(expected.as_str());
    for id in &world.connected {
        let controller = world.clients.controller(*id);
        if controller.as_ref() != Some(&expected) {
            return Err(anyhow!(
                "Expected {} controlled by {}, got {:?}",
                id,
                expected,
                controller
            ));
        }
    }
    Ok(())
}

// =============================================================================
// Spans
// =============================================================================

#[then(expr = "span {string} was recorded")]
fn span_recorded(world: &mut ShellWorld, name: String) -> Result<(), Error> {
    if !world.span_collector.has_span(&name) {
        return Err(anyhow!(
            "Expected span '{}' not found. Captured spans: {:?}",
            name,
            world.span_collector.span_names()
        ));
    }
    Ok(())
}

#[then(expr = "no span {string} was recorded")]
fn span_not_recorded(world: &mut ShellWorld, name: String) -> Result<(), Error> {
    if world.span_collector.has_span(&name) {
        return Err(anyhow!(
            "Span '{}' was not expected. Captured spans: {:?}",
            name,
            world.span_collector.span_names()
        ));
    }
    Ok(())
}

#[then(expr = "span {string} has {word} = {string}")]
fn span_field(
    world: &mut ShellWorld,
    name: String,
    field: String,
    expected: String,
) -> Result<(), Error> {
    let actual = world.span_collector.get_field(&name, &field);
    if actual.as_deref() != Some(expected.as_str()) {
        return Err(anyhow!(
            "Expected span '{}' field {} = {}, got {:?}",
            name,
            field,
            expected,
            actual
        ));
    }
    Ok(())
}

fn expect_source(world: &ShellWorld, expected: ResponseSource) -> Result<(), Error> {
    let served = world
        .outcome()?
        .response()
        .ok_or_else(|| anyhow!("No response available"))?;
    if served.source != expected {
        return Err(anyhow!(
            "Expected response from {}, got {}",
            expected,
            served.source
        ));
    }
    Ok(())
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
