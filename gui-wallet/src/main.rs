//! Minimal desktop client for the Controller's JSON-RPC surface.
//!
//! This stands in for the pedagogical source's Qt console: every button
//! here is a direct translation of a dialog in that UI, now firing a plain
//! HTTP JSON-RPC request instead of a Qt slot. Layout and styling are not
//! specified beyond reaching the four Controller operations plus a
//! snapshot view.

use eframe::{egui, NativeOptions};
use serde_json::{json, Value};

fn main() -> eframe::Result<()> {
    let app = WalletApp::default();
    eframe::run_native(
        "Pebblechain Wallet",
        NativeOptions::default(),
        Box::new(|_cc| Box::new(app)),
    )
}

/// Issues one JSON-RPC 2.0 call against the Controller and returns the
/// `result` field, or the `error` field's message on failure.
fn call_rpc(rpc_url: &str, method: &str, params: Value) -> Result<Value, String> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response: Value = reqwest::blocking::Client::new()
        .post(rpc_url)
        .json(&body)
        .send()
        .map_err(|e| e.to_string())?
        .json()
        .map_err(|e| e.to_string())?;

    if let Some(error) = response.get("error") {
        return Err(error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("RPC call failed")
            .to_string());
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

struct WalletApp {
    rpc_url: String,
    address: String,
    recipient: String,
    amount: String,
    peer: String,
    snapshot: String,
    status: String,
}

impl Default for WalletApp {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8787".to_string(),
            address: String::new(),
            recipient: String::new(),
            amount: String::new(),
            peer: String::new(),
            snapshot: String::new(),
            status: String::new(),
        }
    }
}

impl WalletApp {
    fn refresh_address(&mut self) {
        match call_rpc(&self.rpc_url, "pebblechain_address", json!([])) {
            Ok(value) => {
                self.address = value.as_str().unwrap_or_default().to_string();
                self.status = "address refreshed".to_string();
            }
            Err(e) => self.status = format!("No blockchain: {e}"),
        }
    }

    fn submit_transaction(&mut self) {
        let amount: f64 = match self.amount.parse() {
            Ok(v) => v,
            Err(_) => {
                self.status = "amount must be a number".to_string();
                return;
            }
        };
        match call_rpc(
            &self.rpc_url,
            "pebblechain_submitTransaction",
            json!([self.recipient, amount]),
        ) {
            Ok(_) => self.status = format!("sent {amount} to {}", self.recipient),
            Err(e) => self.status = format!("No blockchain: {e}"),
        }
    }

    fn request_mine(&mut self) {
        match call_rpc(&self.rpc_url, "pebblechain_requestMine", json!([])) {
            Ok(block) => self.status = format!("mined block: {block}"),
            Err(e) => self.status = format!("No blockchain: {e}"),
        }
    }

    fn add_peer(&mut self) {
        match call_rpc(&self.rpc_url, "pebblechain_addPeer", json!([self.peer])) {
            Ok(_) => self.status = format!("peer {} added", self.peer),
            Err(e) => self.status = format!("No blockchain: {e}"),
        }
    }

    fn refresh_snapshot(&mut self) {
        match call_rpc(&self.rpc_url, "pebblechain_snapshot", json!([])) {
            Ok(chain) => {
                self.snapshot =
                    serde_json::to_string_pretty(&chain).unwrap_or_else(|_| chain.to_string());
                self.status = "snapshot refreshed".to_string();
            }
            Err(e) => self.status = format!("No blockchain: {e}"),
        }
    }
}

impl eframe::App for WalletApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Pebblechain Wallet");
            ui.horizontal(|ui| {
                ui.label("Controller RPC URL");
                ui.text_edit_singleline(&mut self.rpc_url);
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.label(format!("Address: {}", self.address));
                if ui.button("Refresh").clicked() {
                    self.refresh_address();
                }
            });

            ui.separator();
            ui.heading("Send Transaction");
            ui.horizontal(|ui| {
                ui.label("Recipient");
                ui.text_edit_singleline(&mut self.recipient);
            });
            ui.horizontal(|ui| {
                ui.label("Amount");
                ui.text_edit_singleline(&mut self.amount);
            });
            if ui.button("Send").clicked() {
                self.submit_transaction();
            }

            ui.separator();
            ui.heading("Mine");
            if ui.button("Mine pending transactions").clicked() {
                self.request_mine();
            }

            ui.separator();
            ui.heading("Peers");
            ui.horizontal(|ui| {
                ui.label("host:port");
                ui.text_edit_singleline(&mut self.peer);
            });
            if ui.button("Add peer").clicked() {
                self.add_peer();
            }

            ui.separator();
            ui.heading("Chain Snapshot");
            if ui.button("Refresh snapshot").clicked() {
                self.refresh_snapshot();
            }
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.monospace(&self.snapshot);
            });

            ui.separator();
            ui.label(&self.status);
        });
    }
}
