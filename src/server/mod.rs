pub mod api;

use crate::agent::StylistAgent;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<StylistAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<StylistAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::serve(&self.addr, self.agent.clone(), &self.args).await
    }
}
