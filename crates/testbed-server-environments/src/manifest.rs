// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Manifest generation: Deployment, Service and Ingress for one environment.
//!
//! Objects are built from `k8s-openapi` types and serialized to a
//! multi-document YAML stream. Nothing here performs I/O.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
	Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, PodSpec, PodTemplateSpec,
	Probe, ResourceRequirements, SecretKeySelector, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
	HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
	IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;

use crate::config::ManagerConfig;
use crate::naming::{ingress_name, public_host, workload_name, WORKLOAD_PORT};
use crate::types::Environment;

const APP_LABEL: &str = "app";
const APP_NAME: &str = "fern";
const ENVIRONMENT_LABEL: &str = "environment";
const ENV_ID_LABEL: &str = "env-id";
const OWNER_LABEL: &str = "owner";
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY: &str = "testbed";
const CONTAINER_NAME: &str = "fern";
const HEALTH_PATH: &str = "/health";
const MAX_LABEL_LENGTH: usize = 63;
const DOCUMENT_SEPARATOR: &str = "---\n";

/// Render the manifest stream for `env`.
pub fn generate(env: &Environment, config: &ManagerConfig) -> String {
	let documents = [
		to_yaml_document("Deployment", &build_deployment(env, config)),
		to_yaml_document("Service", &build_service(env)),
		to_yaml_document("Ingress", &build_ingress(env, config)),
	];
	documents.join(DOCUMENT_SEPARATOR)
}

/// Serialize one object. `k8s-openapi` types always serialize; should that
/// ever change, the document is replaced by a comment that makes the apply
/// step fail loudly instead of aborting the caller.
fn to_yaml_document<T: Serialize>(kind: &str, object: &T) -> String {
	match serde_yaml::to_string(object) {
		Ok(yaml) => yaml,
		Err(e) => {
			tracing::error!(kind, error = %e, "failed to serialize manifest object");
			format!("# {kind} could not be rendered: {e}\n")
		}
	}
}

/// Sanitize a string to be a valid Kubernetes label value.
fn sanitize_label_value(value: &str) -> String {
	let sanitized: String = value
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
				c
			} else {
				'_'
			}
		})
		.take(MAX_LABEL_LENGTH)
		.collect();

	sanitized
		.trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
		.trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
		.to_string()
}

fn selector_labels(env: &Environment) -> BTreeMap<String, String> {
	let mut labels = BTreeMap::new();
	labels.insert(APP_LABEL.to_string(), APP_NAME.to_string());
	labels.insert(ENV_ID_LABEL.to_string(), env.id.to_string());
	labels
}

fn object_labels(env: &Environment) -> BTreeMap<String, String> {
	let mut labels = selector_labels(env);
	labels.insert(ENVIRONMENT_LABEL.to_string(), env.name.clone());
	labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
	let owner = sanitize_label_value(&env.owner);
	if !owner.is_empty() {
		labels.insert(OWNER_LABEL.to_string(), owner);
	}
	labels
}

fn object_meta(name: String, env: &Environment) -> ObjectMeta {
	ObjectMeta {
		name: Some(name),
		namespace: Some(env.namespace.clone()),
		labels: Some(object_labels(env)),
		..Default::default()
	}
}

fn plain_env(name: &str, value: impl Into<String>) -> EnvVar {
	EnvVar {
		name: name.to_string(),
		value: Some(value.into()),
		value_from: None,
	}
}

fn build_env_vars(env: &Environment, config: &ManagerConfig) -> Vec<EnvVar> {
	let workload = &config.workload;
	let mut vars = vec![
		plain_env("NODE_ENV", "development"),
		plain_env("ENVIRONMENT_ID", env.id.to_string()),
		plain_env("DATABASE_HOST", workload.database_host.clone()),
		plain_env("DATABASE_NAME", env.database_schema.clone()),
		plain_env("DATABASE_USER", workload.database_user.clone()),
		EnvVar {
			name: "DATABASE_PASSWORD".to_string(),
			value: None,
			value_from: Some(EnvVarSource {
				secret_key_ref: Some(SecretKeySelector {
					name: workload.database_secret.clone(),
					key: workload.database_secret_key.clone(),
					optional: None,
				}),
				..Default::default()
			}),
		},
		plain_env("REDIS_HOST", workload.cache_host.clone()),
		plain_env("REDIS_PREFIX", env.cache_prefix.clone()),
		plain_env("MQTT_HOST", workload.bus_host.clone()),
		plain_env("MQTT_TOPIC_PREFIX", env.topic_prefix.clone()),
	];

	if let Some(branch) = &env.branch {
		vars.push(plain_env("GIT_BRANCH", branch.clone()));
	}
	if let Some(commit) = &env.commit {
		vars.push(plain_env("GIT_COMMIT", commit.clone()));
	}

	vars
}

fn build_deployment(env: &Environment, config: &ManagerConfig) -> Deployment {
	let mut requests = BTreeMap::new();
	requests.insert("cpu".to_string(), Quantity("100m".to_string()));
	requests.insert("memory".to_string(), Quantity("256Mi".to_string()));

	let mut limits = BTreeMap::new();
	limits.insert("cpu".to_string(), Quantity("500m".to_string()));
	limits.insert("memory".to_string(), Quantity("512Mi".to_string()));

	let container = Container {
		name: CONTAINER_NAME.to_string(),
		image: Some(config.workload.image.clone()),
		ports: Some(vec![ContainerPort {
			container_port: WORKLOAD_PORT,
			..Default::default()
		}]),
		env: Some(build_env_vars(env, config)),
		resources: Some(ResourceRequirements {
			requests: Some(requests),
			limits: Some(limits),
			..Default::default()
		}),
		readiness_probe: Some(Probe {
			http_get: Some(HTTPGetAction {
				path: Some(HEALTH_PATH.to_string()),
				port: IntOrString::Int(WORKLOAD_PORT),
				..Default::default()
			}),
			initial_delay_seconds: Some(10),
			period_seconds: Some(5),
			..Default::default()
		}),
		..Default::default()
	};

	Deployment {
		metadata: object_meta(workload_name(&env.name), env),
		spec: Some(DeploymentSpec {
			replicas: Some(1),
			selector: LabelSelector {
				match_labels: Some(selector_labels(env)),
				..Default::default()
			},
			template: PodTemplateSpec {
				metadata: Some(ObjectMeta {
					labels: Some(object_labels(env)),
					..Default::default()
				}),
				spec: Some(PodSpec {
					containers: vec![container],
					..Default::default()
				}),
			},
			..Default::default()
		}),
		status: None,
	}
}

fn build_service(env: &Environment) -> Service {
	Service {
		metadata: object_meta(workload_name(&env.name), env),
		spec: Some(ServiceSpec {
			selector: Some(selector_labels(env)),
			ports: Some(vec![ServicePort {
				port: WORKLOAD_PORT,
				target_port: Some(IntOrString::Int(WORKLOAD_PORT)),
				..Default::default()
			}]),
			..Default::default()
		}),
		status: None,
	}
}

fn build_ingress(env: &Environment, config: &ManagerConfig) -> Ingress {
	let mut annotations = BTreeMap::new();
	annotations.insert(
		"kubernetes.io/ingress.class".to_string(),
		config.workload.ingress_class.clone(),
	);
	annotations.insert(
		"alb.ingress.kubernetes.io/scheme".to_string(),
		"internet-facing".to_string(),
	);
	annotations.insert(
		"alb.ingress.kubernetes.io/group.name".to_string(),
		config.workload.ingress_group.clone(),
	);
	annotations.insert(
		"alb.ingress.kubernetes.io/listen-ports".to_string(),
		r#"[{"HTTPS":443}]"#.to_string(),
	);
	annotations.insert(
		"alb.ingress.kubernetes.io/ssl-redirect".to_string(),
		"443".to_string(),
	);

	let mut metadata = object_meta(ingress_name(&env.name), env);
	metadata.annotations = Some(annotations);

	let path = HTTPIngressPath {
		path: Some("/".to_string()),
		path_type: "Prefix".to_string(),
		backend: IngressBackend {
			service: Some(IngressServiceBackend {
				name: workload_name(&env.name),
				port: Some(ServiceBackendPort {
					number: Some(WORKLOAD_PORT),
					..Default::default()
				}),
			}),
			..Default::default()
		},
	};

	Ingress {
		metadata,
		spec: Some(IngressSpec {
			rules: Some(vec![IngressRule {
				host: Some(public_host(&env.name, &config.base_domain)),
				http: Some(HTTPIngressRuleValue { paths: vec![path] }),
			}]),
			..Default::default()
		}),
		status: None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::naming;
	use crate::types::{EnvironmentId, EnvironmentStatus, EnvironmentType};
	use chrono::Utc;
	use serde::Deserialize;
	use serde_yaml::Value;

	fn sample_env(config: &ManagerConfig) -> Environment {
		let id: EnvironmentId = "0a1b2c3d".parse().unwrap();
		let handles = naming::derive(&id, Some("checkout"), &config.namespace, &config.base_domain);
		let now = Utc::now();
		Environment {
			id,
			name: handles.name,
			env_type: EnvironmentType::Ephemeral,
			status: EnvironmentStatus::Creating,
			owner: "alice@example.com".to_string(),
			branch: Some("feature/checkout".to_string()),
			commit: None,
			namespace: config.namespace.clone(),
			database_schema: handles.database_schema,
			cache_prefix: handles.cache_prefix,
			topic_prefix: handles.topic_prefix,
			internal_url: handles.internal_url,
			url: handles.url,
			created_at: now,
			expires_at: now,
			deleted_at: None,
			error: None,
		}
	}

	fn documents(text: &str) -> Vec<Value> {
		serde_yaml::Deserializer::from_str(text)
			.map(|doc| Value::deserialize(doc).unwrap())
			.collect()
	}

	fn env_value<'a>(container: &'a Value, name: &str) -> Option<&'a Value> {
		container["env"]
			.as_sequence()
			.unwrap()
			.iter()
			.find(|v| v["name"].as_str() == Some(name))
	}

	#[test]
	fn emits_three_documents_in_order() {
		let config = ManagerConfig::default();
		let docs = documents(&generate(&sample_env(&config), &config));
		let kinds: Vec<_> = docs.iter().map(|d| d["kind"].as_str().unwrap()).collect();
		assert_eq!(kinds, vec!["Deployment", "Service", "Ingress"]);
		assert_eq!(docs[0]["apiVersion"].as_str(), Some("apps/v1"));
		assert_eq!(docs[2]["apiVersion"].as_str(), Some("networking.k8s.io/v1"));
	}

	#[test]
	fn deployment_wires_isolation_handles() {
		let config = ManagerConfig::default();
		let env = sample_env(&config);
		let docs = documents(&generate(&env, &config));
		let deployment = &docs[0];

		assert_eq!(deployment["metadata"]["name"].as_str(), Some("checkout-fern"));
		assert_eq!(deployment["metadata"]["namespace"].as_str(), Some("texecom-envs"));
		assert_eq!(deployment["spec"]["replicas"].as_i64(), Some(1));

		let container = &deployment["spec"]["template"]["spec"]["containers"][0];
		assert_eq!(container["image"].as_str(), Some(config.workload.image.as_str()));
		assert_eq!(
			env_value(container, "DATABASE_NAME").unwrap()["value"].as_str(),
			Some("texecom_env_0a1b2c3d")
		);
		assert_eq!(
			env_value(container, "REDIS_PREFIX").unwrap()["value"].as_str(),
			Some("env:0a1b2c3d:")
		);
		assert_eq!(
			env_value(container, "MQTT_TOPIC_PREFIX").unwrap()["value"].as_str(),
			Some("env/0a1b2c3d/")
		);
		assert_eq!(
			env_value(container, "GIT_BRANCH").unwrap()["value"].as_str(),
			Some("feature/checkout")
		);
		assert!(env_value(container, "GIT_COMMIT").is_none());

		let password = env_value(container, "DATABASE_PASSWORD").unwrap();
		assert!(password.get("value").is_none());
		assert_eq!(
			password["valueFrom"]["secretKeyRef"]["name"].as_str(),
			Some("texecom-cloud-secrets")
		);

		assert_eq!(
			container["readinessProbe"]["httpGet"]["path"].as_str(),
			Some("/health")
		);
	}

	#[test]
	fn service_selects_only_this_environment() {
		let config = ManagerConfig::default();
		let docs = documents(&generate(&sample_env(&config), &config));
		let selector = &docs[1]["spec"]["selector"];
		assert_eq!(selector["app"].as_str(), Some("fern"));
		assert_eq!(selector["env-id"].as_str(), Some("0a1b2c3d"));
		assert_eq!(docs[1]["spec"]["ports"][0]["port"].as_i64(), Some(8080));
	}

	#[test]
	fn ingress_routes_public_host_to_service() {
		let config = ManagerConfig::default();
		let docs = documents(&generate(&sample_env(&config), &config));
		let ingress = &docs[2];

		assert_eq!(ingress["metadata"]["name"].as_str(), Some("checkout-ingress"));
		assert_eq!(
			ingress["metadata"]["annotations"]["kubernetes.io/ingress.class"].as_str(),
			Some("alb")
		);
		let rule = &ingress["spec"]["rules"][0];
		assert_eq!(
			rule["host"].as_str(),
			Some("checkout.envs.services.texecom-develop.com")
		);
		let path = &rule["http"]["paths"][0];
		assert_eq!(path["pathType"].as_str(), Some("Prefix"));
		assert_eq!(
			path["backend"]["service"]["name"].as_str(),
			Some("checkout-fern")
		);
	}

	#[test]
	fn owner_label_is_sanitized() {
		let config = ManagerConfig::default();
		let docs = documents(&generate(&sample_env(&config), &config));
		assert_eq!(
			docs[0]["metadata"]["labels"]["owner"].as_str(),
			Some("alice_example.com")
		);
	}

	#[test]
	fn generation_is_deterministic() {
		let config = ManagerConfig::default();
		let env = sample_env(&config);
		assert_eq!(generate(&env, &config), generate(&env, &config));
	}

	#[test]
	fn sanitize_label_value_trims_and_truncates() {
		assert_eq!(sanitize_label_value("--bob--"), "bob");
		assert_eq!(sanitize_label_value("@@@"), "");
		assert!(sanitize_label_value(&"x".repeat(100)).len() <= MAX_LABEL_LENGTH);
	}
}
