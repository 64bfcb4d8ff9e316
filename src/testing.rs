//! Scripted stand-in for the gateway, shared by unit tests.

use crate::gateway::{GatewayAction, GatewayRequest, GatewayResponse, Upstream};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

type Script = Box<dyn Fn(&GatewayRequest) -> GatewayResponse + Send + Sync>;

pub struct ScriptedUpstream {
    script: Script,
    calls: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedUpstream {
    pub fn new(
        script: impl Fn(&GatewayRequest) -> GatewayResponse + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<GatewayRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, action: GatewayAction) -> Vec<GatewayRequest> {
        self.calls()
            .into_iter()
            .filter(|request| request.action() == action)
            .collect()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn forward(&self, request: GatewayRequest) -> GatewayResponse {
        self.calls.lock().unwrap().push(request.clone());
        (self.script)(&request)
    }
}
