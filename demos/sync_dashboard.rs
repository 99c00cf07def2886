//! Instantiate a one-layer dashboard against a live Maps API and print what
//! came back.
//!
//! ```text
//! RUST_LOG=mapsync=debug MAPSYNC_USER=someone MAPSYNC_API_KEY=... \
//!     cargo run --example sync_dashboard
//! ```

use mapsync::dataviews::{DataviewAttributes, DataviewData};
use mapsync::prelude::*;
use mapsync::windshaft::ReqwestTransport;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let user = std::env::var("MAPSYNC_USER").unwrap_or_else(|_| "documentation".to_string());
    let mut config = SyncConfig::new("https://{user}.carto.com", user).with_stat_tag("mapsync-demo");
    if let Ok(api_key) = std::env::var("MAPSYNC_API_KEY") {
        config = config.with_api_key(api_key);
    }

    let reference = StaticReference::new()
        .with_type("source", AnalysisSchema::new(Vec::<String>::new(), ["query"]));
    let mut dashboard = Dashboard::new(config, Arc::new(reference), Arc::new(ReqwestTransport::new()))?;

    dashboard.analyse(&json!({
        "id": "a0",
        "type": "source",
        "params": { "query": "SELECT * FROM populated_places_simple" }
    }))?;
    dashboard.add_layer(
        Layer::cartodb("places")
            .with_source("a0")
            .with_sql("SELECT * FROM populated_places_simple")
            .with_cartocss("#places { marker-width: 3; }", "2.1.1"),
    )?;
    dashboard.create_dataview(
        "category",
        "places",
        &DataviewAttributes::new().id("countries").source("a0").column("adm0name"),
    )?;

    dashboard.notify_viewport_changed(
        LatLng::new(40.0, -3.0),
        4.0,
        LatLngBounds::from_coords(30.0, -20.0, 50.0, 15.0),
        Instant::now(),
    );
    dashboard.reload(ReloadOptions::new()).await?;

    if let Some(instance) = dashboard.instance() {
        println!("layergroup: {}", instance.layergroup_id());
        for url in instance.get_tiles("mapnik").tiles.iter().take(1) {
            println!("tiles: {}", url);
        }
    }

    match dashboard.dataview("countries").and_then(|dataview| dataview.data()) {
        Some(DataviewData::Category(result)) => {
            for item in result.data.iter().take(10) {
                println!("{:>24} {}", item.name, item.value);
            }
        }
        _ => println!("no category data"),
    }
    Ok(())
}
