//! Transform orchestration.
//!
//! [`RoninTransformer`] drives one resource through normalization, concept
//! mapping, localization and identifier synthesis, then validates the
//! rewritten copy with the profile's pipeline.

use crate::concept_map::{ConceptMapMetadata, ConceptMapNormalizer, ConceptMapRegistry, MappedField};
use crate::config::RoninConfig;
use crate::error::{Result, RoninError};
use crate::identifier::{IdentifierPolicy, IdentifierResolver, normalize_identifiers};
use crate::issue::Rule;
use crate::localizer::{localize, localize_id};
use crate::location::LocationContext;
use crate::normalizer::Normalizer;
use crate::pipeline::ValidationPipeline;
use crate::resource::Resource;
use crate::validation::Validation;
use std::sync::Arc;

/// Read-only tenant descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantContext {
    mnemonic: String,
}

impl TenantContext {
    /// The mnemonic becomes the `{mnemonic}-` id prefix, so it must be a
    /// non-empty run of ASCII letters and digits.
    pub fn new(mnemonic: impl Into<String>) -> Result<Self> {
        let mnemonic = mnemonic.into();
        if mnemonic.is_empty() || !mnemonic.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoninError::configuration(format!(
                "tenant mnemonic '{mnemonic}' must be non-empty ASCII letters and digits"
            )));
        }
        Ok(Self { mnemonic })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }
}

/// Shared collaborators handed to a profile when it builds its pipeline.
#[derive(Clone)]
pub struct ProfileContext {
    pub config: Arc<RoninConfig>,
    pub registry: Arc<dyn ConceptMapRegistry>,
}

/// Per-resource-type configuration of the transformation.
pub trait RoninProfile: Send + Sync {
    fn resource_type(&self) -> &'static str;

    /// Canonical URL written to `meta.profile`.
    fn profile_url(&self) -> &'static str;

    fn qualifies(&self, _resource: &Resource) -> bool {
        true
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::default()
    }

    fn mapped_fields(&self) -> &'static [MappedField] {
        &[]
    }

    /// Fields without which no stable transformed identity exists.
    fn mandatory_fields(&self) -> &'static [&'static str] {
        &["id"]
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline;

    /// Resource-specific final rewrite.
    fn transform_internal(&self, resource: Resource, _tenant: &TenantContext) -> Result<Resource> {
        Ok(resource)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformResponse {
    pub resource: Resource,
    pub concept_map_metadata: Vec<ConceptMapMetadata>,
}

pub struct RoninTransformer<P: RoninProfile> {
    profile: P,
    context: ProfileContext,
    resolver: Option<Arc<dyn IdentifierResolver>>,
    pipeline: ValidationPipeline,
}

impl<P: RoninProfile> RoninTransformer<P> {
    pub fn new(profile: P, registry: Arc<dyn ConceptMapRegistry>, config: Arc<RoninConfig>) -> Self {
        let context = ProfileContext { config, registry };
        let pipeline = profile.pipeline(&context);
        Self {
            profile,
            context,
            resolver: None,
            pipeline,
        }
    }

    pub fn with_identifier_resolver(mut self, resolver: Arc<dyn IdentifierResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn profile(&self) -> &P {
        &self.profile
    }

    /// Whether the resource is in scope for this profile at all.
    pub fn qualifies(&self, resource: &Resource) -> bool {
        resource.resource_type() == self.profile.resource_type() && self.profile.qualifies(resource)
    }

    pub fn validate(&self, resource: &Resource, parent: Option<&LocationContext>) -> Validation {
        let location = parent
            .cloned()
            .unwrap_or_else(|| LocationContext::new(resource.resource_type()));
        self.pipeline.validate(resource, &location)
    }

    /// Rewrites `resource` for `tenant` and validates the result.
    ///
    /// The resource is `None` when no stable identity can be produced: a
    /// mandatory field is missing or the business identifier is unresolvable.
    /// Otherwise it is returned with every collected issue, ERRORs included.
    pub fn transform(
        &self,
        resource: Resource,
        tenant: &TenantContext,
    ) -> (Option<TransformResponse>, Validation) {
        let tenant_key = tenant.mnemonic();
        let root = LocationContext::new(resource.resource_type());
        let mut validation = Validation::new();
        tracing::debug!(
            "Transforming {} {:?} for tenant {}",
            resource.resource_type(),
            resource.id(),
            tenant_key
        );

        for field in self.profile.mandatory_fields() {
            if !resource.has_field(field) {
                validation.add_rule(Rule::required_field(field), root.append(field));
            }
        }
        let raw_id = match resource.id() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                if resource.has_field("id") {
                    validation.add_rule(Rule::invalid_type("id", "expected a string"), root.append("id"));
                } else if !self.profile.mandatory_fields().contains(&"id") {
                    validation.add_rule(Rule::required_field("id"), root.append("id"));
                }
                tracing::warn!(
                    "{} has no string id; unable to transform for tenant {}",
                    resource.resource_type(),
                    tenant_key
                );
                return (None, validation);
            }
        };
        if validation.has_errors() {
            tracing::warn!(
                "{} {} is missing mandatory fields; unable to transform",
                resource.resource_type(),
                raw_id
            );
            return (None, validation);
        }

        let config = self.context.config.as_ref();
        let resource = Normalizer::new(config).normalize(resource);
        let (resource, mapping, metadata) =
            ConceptMapNormalizer::new(self.context.registry.as_ref(), config).normalize_fields(
                resource,
                tenant_key,
                self.profile.mapped_fields(),
            );
        validation.merge(mapping);

        let mut resource = localize(resource, tenant_key);
        resource.set_id(localize_id(&raw_id, tenant_key));

        let resource = match normalize_identifiers(
            resource,
            tenant_key,
            &raw_id,
            self.profile.identifier_policy(),
            config,
            self.resolver.as_deref(),
        ) {
            Ok(resource) => resource,
            Err(RoninError::VendorIdentifierNotFound { tenant: unresolved }) => {
                tracing::warn!(
                    "Unable to resolve a business identifier for {} {} (tenant {})",
                    root,
                    raw_id,
                    unresolved
                );
                validation.add_rule(
                    Rule::unresolved_vendor_identifier(&unresolved),
                    root.append("identifier"),
                );
                return (None, validation);
            }
            Err(e) => {
                tracing::warn!("Identifier normalization failed for {} {}: {}", root, raw_id, e);
                validation.add_rule(
                    Rule::invalid_type("identifier", &e.to_string()),
                    root.append("identifier"),
                );
                return (None, validation);
            }
        };

        let resource = match self.finish(resource, tenant) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::warn!("Unable to finish {} {}: {}", root, raw_id, e);
                let (field, message) = match &e {
                    RoninError::InvalidField { field, message } => (field.clone(), message.clone()),
                    other => (root.to_string(), other.to_string()),
                };
                validation.add_rule(Rule::invalid_type(&field, &message), root.clone());
                return (None, validation);
            }
        };

        validation.merge(self.pipeline.validate(&resource, &root));
        tracing::debug!(
            "Transformed {} {} for tenant {} with {} issue(s)",
            root,
            raw_id,
            tenant_key,
            validation.len()
        );
        (
            Some(TransformResponse {
                resource,
                concept_map_metadata: metadata,
            }),
            validation,
        )
    }

    fn finish(&self, mut resource: Resource, tenant: &TenantContext) -> Result<Resource> {
        resource.add_meta_profile(self.profile.profile_url())?;
        self.profile.transform_internal(resource, tenant)
    }
}
