//! serde targets mirroring the workflow markup as written.
//!
//! Fields that accept several shapes in the markup (`runs-on`, `needs`,
//! `env`, `if`) stay as `serde_yaml::Value` and are normalized by the loader.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

#[derive(Debug, Deserialize)]
pub struct RawWorkflow {
    pub name: Option<Value>,
    pub on: Option<Value>,
    pub env: Option<Value>,
    pub permissions: Option<Value>,
    pub jobs: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawJob {
    pub name: Option<Value>,
    pub runs_on: Option<Value>,
    pub needs: Option<Value>,
    #[serde(rename = "if")]
    pub condition: Option<Value>,
    pub env: Option<Value>,
    pub permissions: Option<Value>,
    pub steps: Option<Vec<RawStep>>,
    pub uses: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawStep {
    pub id: Option<Value>,
    pub name: Option<Value>,
    pub uses: Option<String>,
    pub run: Option<Value>,
    pub shell: Option<String>,
    #[serde(rename = "if")]
    pub condition: Option<Value>,
    pub env: Option<Value>,
    pub with: Option<Value>,
}
