//! crates/personnel_core/src/testing.rs
//!
//! An in-process `ApiGateway` that answers from a script and records every
//! request it receives. Used by the unit tests here and, through the `testing`
//! feature, by the service crate.
//!
//! A paused gateway holds every request until it is released, either in arrival
//! order (`release`) or individually (`release_request`). Responses are taken
//! from the script when a request settles, not when it arrives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::ports::{ApiGateway, ApiRequest, PortError, PortResult};

#[derive(Default)]
struct Gate {
    /// Held requests by arrival index, oldest first.
    held: Vec<(usize, Arc<Semaphore>)>,
    /// Releases granted before the matching request arrived.
    credit: usize,
}

#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<PortResult<Value>>>,
    requests: Mutex<Vec<ApiRequest>>,
    gate: Option<Mutex<Gate>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose responses are held until released.
    pub fn paused() -> Self {
        Self {
            gate: Some(Mutex::new(Gate::default())),
            ..Self::default()
        }
    }

    pub fn respond(&self, body: Value) {
        self.push(Ok(body));
    }

    pub fn fail(&self, err: PortError) {
        self.push(Err(err));
    }

    fn push(&self, result: PortResult<Value>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    /// Lets the `n` oldest held requests settle; requests not sent yet pass straight through.
    pub fn release(&self, n: usize) {
        let Some(Ok(mut gate)) = self.gate.as_ref().map(|gate| gate.lock()) else {
            return;
        };
        for _ in 0..n {
            if gate.held.is_empty() {
                gate.credit += 1;
            } else {
                let (_, permit) = gate.held.remove(0);
                permit.add_permits(1);
            }
        }
    }

    /// Lets the request with arrival index `index` settle (0 is the first request sent).
    pub fn release_request(&self, index: usize) {
        let Some(Ok(mut gate)) = self.gate.as_ref().map(|gate| gate.lock()) else {
            return;
        };
        if let Some(pos) = gate.held.iter().position(|(held, _)| *held == index) {
            let (_, permit) = gate.held.remove(pos);
            permit.add_permits(1);
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Registers an arriving request with the gate; `None` when it may settle at once.
    fn hold(&self, index: usize) -> PortResult<Option<Arc<Semaphore>>> {
        let Some(gate) = &self.gate else {
            return Ok(None);
        };
        let mut gate = gate
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if gate.credit > 0 {
            gate.credit -= 1;
            return Ok(None);
        }
        let permit = Arc::new(Semaphore::new(0));
        gate.held.push((index, permit.clone()));
        Ok(Some(permit))
    }
}

#[async_trait]
impl ApiGateway for ScriptedGateway {
    async fn send(&self, request: ApiRequest) -> PortResult<Value> {
        // Registered with the gate before the request becomes visible to `requests()`.
        let held = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let held = self.hold(requests.len())?;
            requests.push(request);
            held
        };
        if let Some(permit) = held {
            permit
                .acquire()
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .forget();
        }
        self.script
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("no scripted response".to_string())))
    }
}
