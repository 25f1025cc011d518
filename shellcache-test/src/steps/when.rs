use anyhow::{Error, anyhow};
use cucumber::{gherkin::Step, when};
use shellcache::{ControlCommand, ControlMessage, Event};

use crate::world::ShellWorld;

#[when(expr = "generation {string} is installed")]
async fn generation_installed(world: &mut ShellWorld, generation: String) -> Result<(), Error> {
    world.install(&generation).await
}

#[when(expr = "the pending generation is activated")]
async fn pending_activated(world: &mut ShellWorld) -> Result<(), Error> {
    world.activate().await
}

/// Runs CLEAR_CACHE on the latest deployment directly, so its spans are
/// captured.
#[when(expr = "the cache is cleared")]
async fn cache_cleared(world: &mut ShellWorld) -> Result<(), Error> {
    world
        .dispatch(Event::Message(ControlMessage::new(ControlCommand::ClearCache)))
        .await?;
    Ok(())
}

#[when(expr = "captured spans are cleared")]
fn spans_cleared(world: &mut ShellWorld) -> Result<(), Error> {
    world.span_collector.clear();
    Ok(())
}

#[when(expr = "the client posts {string}")]
async fn client_posts(world: &mut ShellWorld, raw: String) -> Result<(), Error> {
    world.post(&raw).await?;
    Ok(())
}

/// Posts the docstring as one raw control message.
#[when(expr = "the client posts")]
async fn client_posts_docstring(world: &mut ShellWorld, step: &Step) -> Result<(), Error> {
    let raw = step
        .docstring
        .as_ref()
        .ok_or_else(|| anyhow!("message not provided"))?;
    world.post(raw.trim()).await?;
    Ok(())
}

#[when(expr = "{string} is requested")]
async fn requested(world: &mut ShellWorld, path: String) -> Result<(), Error> {
    world.request(&path).await
}

#[when(expr = "{string} is requested {int} times")]
async fn requested_times(world: &mut ShellWorld, path: String, times: usize) -> Result<(), Error> {
    let mut bodies = Vec::with_capacity(times);
    for _ in 0..times {
        world.request(&path).await?;
        let served = world
            .outcome()?
            .response()
            .ok_or_else(|| anyhow!("request for {} was not served", path))?;
        bodies.push(served.response.body().clone());
    }
    if bodies.windows(2).any(|pair| pair[0] != pair[1]) {
        return Err(anyhow!("responses for {} differ between requests", path));
    }
    Ok(())
}

#[when(expr = "the network goes offline")]
fn network_goes_offline(world: &mut ShellWorld) -> Result<(), Error> {
    world.network.go_offline();
    Ok(())
}

#[when(expr = "the network comes back online")]
fn network_back_online(world: &mut ShellWorld) -> Result<(), Error> {
    world.network.go_online();
    Ok(())
}
