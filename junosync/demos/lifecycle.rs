//! Lifecycle example
//!
//! Drives every resource kind through create, read, update, import and
//! delete against an in-memory device, then shows how failures are reported.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example lifecycle
//!
//! # With engine debug logs
//! RUST_LOG=junosync=debug cargo run --example lifecycle
//! ```

use junosync::resource::kinds::{
    DhcpRelay, DhcpVersion, InterfacePhysical, NatContext, NatRule, NatSourceRuleSet, NatThen,
    ProxyProfile,
};
use junosync::session::memory::MemoryDevice;
use junosync::{DeletePolicy, EngineBuilder, Error, Resource, SessionHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== junosync Lifecycle Example ===\n");

    let device = MemoryDevice::new();
    device.load(&[
        "set routing-instances blue instance-type virtual-router",
        "set interfaces ge-0/0/1 unit 100 family inet address 192.0.2.1/24",
    ]);
    let session = SessionHandle::new(device.session());
    let engine = EngineBuilder::new()
        .delete_policy(DeletePolicy::LeavePlaceholder)
        .comment_prefix("demo")
        .build();

    // Proxy profile
    let profile = ProxyProfile {
        name: "web".to_string(),
        protocol_http_host: Some("10.0.0.1".to_string()),
        protocol_http_port: Some(3128),
    };
    let created = engine.create(&session, &profile).await?;
    println!("Created proxy profile '{}'", created.value.identifier());

    // Interface, updated in place
    let mut iface = InterfacePhysical {
        name: "ge-0/0/1".to_string(),
        description: Some("uplink".to_string()),
        mtu: Some(1514),
        ..Default::default()
    };
    engine.create(&session, &iface).await?;
    iface.mtu = Some(9192);
    engine.update(&session, &iface).await?;
    println!("Updated interface '{}' to mtu 9192", iface.name);

    // DHCP relay in a routing instance, both families
    for version in [DhcpVersion::V4, DhcpVersion::V6] {
        let relay = DhcpRelay {
            routing_instance: "blue".to_string(),
            version,
            forward_snooped_clients: Some("all-interfaces".to_string()),
            ..Default::default()
        };
        engine.create(&session, &relay).await?;
        println!("Created dhcp relay '{}'", relay.identifier());
    }

    // Source NAT rule set
    let nat = NatSourceRuleSet {
        name: "outbound".to_string(),
        from: Some(NatContext {
            kind: "zone".to_string(),
            value: vec!["trust".to_string()],
        }),
        to: Some(NatContext {
            kind: "zone".to_string(),
            value: vec!["untrust".to_string()],
        }),
        rule: vec![NatRule {
            name: "all".to_string(),
            then: Some(NatThen {
                kind: "interface".to_string(),
                pool: None,
            }),
            ..Default::default()
        }],
        ..Default::default()
    };
    engine.create(&session, &nat).await?;

    let imported = engine
        .import_any(&session, "junos_security_nat_source", "outbound")
        .await?;
    println!("Imported {} '{}'", imported.kind(), imported.identifier());

    // Failures
    match engine.create(&session, &profile).await {
        Err(e @ Error::Duplicate { .. }) => println!("\nExpected failure: {}", e),
        other => println!("\nUnexpected result: {:?}", other),
    }

    let mut bad = iface.clone();
    bad.trunk = true;
    bad.trunk_non_els = true;
    if let Err(e) = engine.update(&session, &bad).await {
        println!("Expected failure: {}", e);
        if let Some(path) = e.field_path() {
            println!("  field: {}", path);
        }
    }

    // Delete leaves a disabled placeholder on the port
    engine
        .delete::<InterfacePhysical, _>(&session, &iface.name)
        .await?;

    println!("\nRunning configuration:");
    for line in device.running_config() {
        println!("  set {}", line);
    }

    println!("\nCommits:");
    for comment in device.commits() {
        println!("  {}", comment);
    }

    session.close().await?;
    Ok(())
}
