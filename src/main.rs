use anyhow::{Context, Result};
use rdf_entity::{
    Connection, EngineConfig, EntityStorage, FieldValue, HttpConnection, MemoryConnection, Operator,
    Record, SortDirection,
};
use std::collections::BTreeMap;
use std::sync::Arc;

const DEMO_CONFIG: &str = include_str!("../config/demo.yaml");

/// Usage: `rdf-entity-demo [config.yaml] [--remote]`
///
/// Without `--remote` the demo runs against an embedded store.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("RDF Entity v{}", rdf_entity::version());
    println!("==========================================");
    println!();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let remote = args.iter().any(|a| a == "--remote");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => EngineConfig::from_path(path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::from_yaml_str(DEMO_CONFIG).context("parsing demo config")?,
    };

    let connection: Arc<dyn Connection> = if remote {
        println!("Connecting to {}", config.connection.endpoint);
        Arc::new(HttpConnection::new(&config.connection)?)
    } else {
        println!("Using the embedded store");
        Arc::new(MemoryConnection::new()?)
    };

    let storage = EntityStorage::builder(config)
        .connection(connection)
        .build("rdf_entity")?;

    demo_graphs(&storage)?;
    demo_queries(&storage)?;

    Ok(())
}

fn demo_graphs(storage: &EntityStorage) -> Result<()> {
    println!("\n=== Demo 1: Named graphs ===");
    let draft = vec!["draft".to_string()];
    let both = vec!["default".to_string(), "draft".to_string()];

    let mut apple = Record::new("rdf_entity", "fruit")
        .with_id("http://example.com/apple")
        .with_graph("draft");
    apple.set_value("label", "Apple");
    apple.set_translation_value("fr", "label", "Pomme");
    apple.set_value("harvested", 1_700_000_000i64);
    let mut dimensions = BTreeMap::new();
    dimensions.insert("width".to_string(), FieldValue::from(8));
    dimensions.insert("height".to_string(), FieldValue::from(9));
    apple.set_value("dimensions", FieldValue::Map(dimensions));

    let status = storage.save(&mut apple)?;
    println!("Saved {:?} as {:?} in graph 'draft'", apple.id(), status);

    let loaded = storage
        .load("http://example.com/apple", Some(&both))?
        .context("apple not found")?;
    println!("Loaded from candidates {:?}: graph {:?}", both, loaded.graph());
    println!("  label      = {:?}", loaded.value("label"));
    println!("  label (fr) = {:?}", loaded.get_translation("label", "fr"));
    println!("  harvested  = {:?}", loaded.value("harvested"));
    println!("  dimensions = {:?}", loaded.value("dimensions"));

    let mut published = loaded;
    published.set_graph("default");
    storage.save(&mut published)?;
    let loaded = storage
        .load("http://example.com/apple", None)?
        .context("apple not published")?;
    println!("Published; default load now returns graph {:?}", loaded.graph());
    println!("Still in draft: {}", storage.has_graph(&loaded, "draft")?);

    storage.delete_from_graph(&[loaded.clone()], "draft")?;
    println!(
        "Deleted from draft; draft load: {:?}, default load: {:?}",
        storage.load("http://example.com/apple", Some(&draft))?.and_then(|r| r.graph().map(String::from)),
        storage.load("http://example.com/apple", None)?.and_then(|r| r.graph().map(String::from)),
    );

    println!("\nTurtle export of the published copy:");
    println!("{}", storage.export(&loaded, "default")?.to_turtle()?);
    Ok(())
}

fn demo_queries(storage: &EntityStorage) -> Result<()> {
    println!("\n=== Demo 2: Entity queries ===");
    for (bundle, label) in [("fruit", "Pear"), ("fruit", "Plum"), ("vegetable", "Leek")] {
        let mut record = Record::new("rdf_entity", bundle);
        record.set_value("label", label);
        storage.save(&mut record)?;
        println!("Created {} {:?}", bundle, record.id());
    }

    let query = storage
        .query()
        .condition("rid", "fruit", Operator::Eq)
        .condition("label", "P", Operator::StartsWith)
        .sort("id", SortDirection::Asc);
    if let Some(sparql) = query.to_sparql()? {
        println!("\n{}\n", sparql);
    }
    println!("Fruits starting with 'P': {}", query.count()?);

    let outcome = storage.load_multiple(&query.execute()?, None)?;
    for record in &outcome.records {
        println!("  {:?} {:?}", record.id(), record.value("label"));
    }
    Ok(())
}
