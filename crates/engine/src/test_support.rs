//! Shared DAG fixtures for unit tests.

use uuid::Uuid;

use crate::models::{
    Artifact, ArtifactId, ArtifactSpec, ConnectorConfig, Operator, OperatorId, OperatorSpec,
    WorkflowDag,
};

pub fn artifact(id: ArtifactId, name: &str, spec: ArtifactSpec) -> Artifact {
    Artifact {
        id,
        name: name.into(),
        description: String::new(),
        spec,
    }
}

pub fn operator(
    id: OperatorId,
    name: &str,
    spec: OperatorSpec,
    inputs: Vec<ArtifactId>,
    outputs: Vec<ArtifactId>,
) -> Operator {
    Operator {
        id,
        name: name.into(),
        description: String::new(),
        spec,
        inputs,
        outputs,
    }
}

pub fn function_spec() -> OperatorSpec {
    OperatorSpec::Function {
        storage_path: "operators/func.zip".into(),
        entry_point: "main".into(),
    }
}

fn connector() -> ConnectorConfig {
    ConnectorConfig {
        service: "postgres".into(),
        integration_id: Uuid::from_u128(0xfeed),
        parameters: serde_json::json!({ "query": "select * from hotel_reviews" }),
    }
}

pub fn extract_spec() -> OperatorSpec {
    OperatorSpec::Extract { connector: connector() }
}

pub fn load_spec() -> OperatorSpec {
    OperatorSpec::Load { connector: connector() }
}

/// extract0 -> art0 --
///                    |--> func0 -> art2 -> load0
/// extract1 -> art1 --
///
/// Operator ids are fixed so that id order matches declaration order.
pub struct BasicDag {
    pub dag: WorkflowDag,
    pub extract0: OperatorId,
    pub extract1: OperatorId,
    pub func0: OperatorId,
    pub load0: OperatorId,
    pub art0: ArtifactId,
    pub art1: ArtifactId,
    pub art2: ArtifactId,
}

pub fn basic_dag() -> BasicDag {
    let (extract0, extract1, func0, load0) = (
        Uuid::from_u128(1),
        Uuid::from_u128(2),
        Uuid::from_u128(3),
        Uuid::from_u128(4),
    );
    let (art0, art1, art2) = (
        Uuid::from_u128(0x101),
        Uuid::from_u128(0x102),
        Uuid::from_u128(0x103),
    );

    let dag = WorkflowDag::new(
        "basic",
        [
            operator(extract0, "extract0", extract_spec(), vec![], vec![art0]),
            operator(extract1, "extract1", extract_spec(), vec![], vec![art1]),
            operator(func0, "func0", function_spec(), vec![art0, art1], vec![art2]),
            operator(load0, "load0", load_spec(), vec![art2], vec![]),
        ],
        [
            artifact(art0, "art0", ArtifactSpec::Table),
            artifact(art1, "art1", ArtifactSpec::Table),
            artifact(art2, "art2", ArtifactSpec::Float),
        ],
    );

    BasicDag {
        dag,
        extract0,
        extract1,
        func0,
        load0,
        art0,
        art1,
        art2,
    }
}
