//! Example demonstrating the model round trip.
//!
//! This example shows how to:
//! - Cast a loosely typed wire payload into a generated-style model
//! - Run the declared validation rules and read their error messages
//! - Serialize a model back into a wire-keyed document
//! - Copy a model while leaving its stream fields behind
//!
//! Run with: `cargo run --example model_roundtrip`

use std::collections::BTreeMap;

use keelson::document::{Document, DocumentMap};
use keelson::error::Result;
use keelson::model::{
    field, validate_maximum, validate_pattern, validate_required, Model, ModelObject, Validate,
};
use keelson::schema::{FieldType, Schema};
use keelson::stream::ByteStream;

#[derive(Debug, Clone, Default)]
struct Disk {
    device: Option<String>,
    size_gib: Option<i64>,
}

static DISK: Schema = Schema {
    type_name: "Disk",
    names: &[("device", "device"), ("size_gib", "sizeGib")],
    types: &[
        ("device", FieldType::String),
        ("size_gib", FieldType::Integer),
    ],
};

impl Validate for Disk {}

impl ModelObject for Disk {
    fn to_map(&self, _without_stream: bool) -> DocumentMap {
        let mut map = DocumentMap::new();
        field::put(&mut map, "device", self.device.clone());
        field::put(&mut map, "sizeGib", self.size_gib);
        map
    }
}

impl Model for Disk {
    fn schema() -> &'static Schema {
        &DISK
    }

    fn from_map(map: &DocumentMap) -> Result<Self> {
        Ok(Disk {
            device: field::string(map, &DISK, "device")?,
            size_gib: field::integer(map, &DISK, "size_gib")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct Instance {
    name: Option<String>,
    cpu_count: Option<i64>,
    labels: Option<BTreeMap<String, String>>,
    disks: Option<Vec<Disk>>,
    console_log: Option<ByteStream>,
}

static INSTANCE: Schema = Schema {
    type_name: "Instance",
    names: &[
        ("console_log", "consoleLog"),
        ("cpu_count", "cpuCount"),
        ("disks", "disks"),
        ("labels", "labels"),
        ("name", "name"),
    ],
    types: &[
        ("console_log", FieldType::Stream),
        ("cpu_count", FieldType::Integer),
        ("disks", FieldType::Array(&FieldType::Model(&DISK))),
        ("labels", FieldType::Map(&FieldType::String)),
        ("name", FieldType::String),
    ],
};

impl Validate for Instance {
    fn validate(&self) -> Result<()> {
        validate_required("name", self.name.as_ref())?;
        validate_pattern("name", self.name.as_deref(), "^[a-z][a-z0-9-]*$")?;
        validate_maximum("cpu_count", self.cpu_count, 64)?;
        self.disks.validate()
    }
}

impl ModelObject for Instance {
    fn to_map(&self, without_stream: bool) -> DocumentMap {
        let mut map = DocumentMap::new();
        field::put_stream(&mut map, "consoleLog", self.console_log.as_ref(), without_stream);
        field::put(&mut map, "cpuCount", self.cpu_count);
        field::put_model_array(&mut map, "disks", self.disks.as_deref(), without_stream);
        field::put_string_map(&mut map, "labels", self.labels.as_ref());
        field::put(&mut map, "name", self.name.clone());
        map
    }
}

impl Model for Instance {
    fn schema() -> &'static Schema {
        &INSTANCE
    }

    fn from_map(map: &DocumentMap) -> Result<Self> {
        Ok(Instance {
            name: field::string(map, &INSTANCE, "name")?,
            cpu_count: field::integer(map, &INSTANCE, "cpu_count")?,
            labels: field::string_map(map, &INSTANCE, "labels")?,
            disks: field::model_array(map, &INSTANCE, "disks")?,
            console_log: field::stream(map, &INSTANCE, "console_log")?,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("keelson=info,model_roundtrip=info")
        .init();

    println!("=== Casting a Wire Payload ===");
    // The numbers arrive as strings and an unknown key tags along, the way
    // real services answer. Casting coerces what the schema declares and
    // drops the rest.
    let raw = Document::from_json(serde_json::json!({
        "name": "build-runner-3",
        "cpuCount": "8",
        "labels": { "team": "ci", "tier": "large" },
        "disks": [
            { "device": "/dev/vda", "sizeGib": 40 },
            { "device": "/dev/vdb", "sizeGib": "200" },
        ],
        "region": "eu-central-1",
    }));

    let instance: Instance = keelson::cast(&raw)?;
    println!("name:      {:?}", instance.name);
    println!("cpu count: {:?} (arrived as the string \"8\")", instance.cpu_count);
    println!("labels:    {:?}", instance.labels);
    for disk in instance.disks.as_deref().unwrap_or_default() {
        println!("disk:      {:?} at {:?} GiB", disk.device, disk.size_gib);
    }

    println!("\n=== Validation ===");
    instance.validate()?;
    println!("the cast instance passes its rules");

    let nameless = Instance {
        name: None,
        ..instance.clone()
    };
    match nameless.validate() {
        Ok(()) => println!("unexpectedly valid"),
        Err(error) => println!("missing name:    {error}"),
    }

    let shouting = Instance {
        name: Some("Build Runner".to_string()),
        ..instance.clone()
    };
    match shouting.validate() {
        Ok(()) => println!("unexpectedly valid"),
        Err(error) => println!("bad name:        {error}"),
    }

    let oversized = Instance {
        cpu_count: Some(512),
        ..instance.clone()
    };
    match oversized.validate() {
        Ok(()) => println!("unexpectedly valid"),
        Err(error) => println!("too many cores:  {error}"),
    }

    println!("\n=== Serializing Back to the Wire ===");
    let wire = instance.to_map(false);
    println!("{:#}", Document::Object(wire).to_json());

    println!("\n=== Copies Without Streams ===");
    let mut with_log = instance.clone();
    with_log.console_log = Some(ByteStream::from_bytes("booting...\n"));
    let copy = with_log.copy_without_stream()?;
    println!("original carries a log: {}", with_log.console_log.is_some());
    println!("copy carries a log:     {}", copy.console_log.is_some());

    Ok(())
}
