mod steps;
use cucumber::World as _;
use steps::{ConfigWorld, DispatchWorld};

#[tokio::main]
async fn main() {
    DispatchWorld::run("tests/features/dispatch.feature").await;
    ConfigWorld::run("tests/features/config.feature").await;
}
