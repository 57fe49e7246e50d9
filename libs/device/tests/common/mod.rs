//! Shared fixtures for device integration tests

#![allow(dead_code)]

use device::{Device, DeviceBuilder};
use device_config::DeviceConfig;
use network::{Fabric, FabricSocket, Transport};
use std::sync::Arc;

/// `n` initialized ranks on one fabric, world rank = opening order
pub fn ranks(n: usize) -> Vec<Device> {
    ranks_with(n, DeviceConfig::default())
}

pub fn ranks_with(n: usize, config: DeviceConfig) -> Vec<Device> {
    let (_, sockets) = sockets(n);
    let endpoints: Vec<_> = sockets.iter().map(|s| s.local_endpoint()).collect();
    sockets
        .into_iter()
        .map(|socket| {
            DeviceBuilder::new(socket, endpoints.clone())
                .config(config.clone())
                .init()
                .expect("device init")
        })
        .collect()
}

pub fn sockets(n: usize) -> (Fabric, Vec<Arc<FabricSocket>>) {
    let fabric = Fabric::new();
    let sockets = fabric.open_many(n);
    (fabric, sockets)
}

/// Config with a short finalize drain for tests that leave work behind
pub fn quick_finalize() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.device.finalize_timeout_ms = 20;
    config
}
