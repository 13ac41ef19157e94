//! Webflow sites scoped to a workspace.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    CodecError, FieldValidator, Observed, ObservedState, ResourceKind, ResourceSpec,
    SecondaryAction, validation,
};
use crate::diff::{FieldSpec, FieldValues, Mutability};
use crate::handle::ResourceHandle;
use crate::transport::{ApiRequest, ApiResponse, Method};

/// Collection segment of site handles.
pub const COLLECTION: &str = "sites";

/// Name of the follow-up action that publishes a site.
pub const PUBLISH_ACTION: &str = "publish";

/// Marker for the site kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Site;

/// Desired site.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteArgs {
    /// Workspace that owns the site.
    pub workspace_id: String,
    /// Name shown in the dashboard.
    pub display_name: String,
    /// Requested slug. The remote assigns the real one; see
    /// [`SiteOutputs::assigned_short_name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Folder the site is filed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<String>,
    /// Template the site is cloned from. Only honoured at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    /// Publish after every successful create or update.
    #[serde(default)]
    pub publish: bool,
    /// Custom domains to publish to; empty publishes to the default domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publish_domains: Vec<String>,
}

impl FieldValues for SiteArgs {
    fn field_value(&self, field: &str) -> Value {
        match field {
            "workspaceId" => json!(self.workspace_id),
            "displayName" => json!(self.display_name),
            "shortName" => json!(self.short_name),
            "parentFolderId" => json!(self.parent_folder_id),
            "templateName" => json!(self.template_name),
            "publish" => json!(self.publish),
            "publishDomains" => json!(self.publish_domains),
            _ => Value::Null,
        }
    }
}

/// Outputs reported by the remote for a site.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteOutputs {
    /// Slug assigned by the remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_short_name: Option<String>,
    /// Time zone configured for the site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// Time of the last publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published: Option<String>,
    /// Time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Preview image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Custom domains attached to the site.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_domains: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSite<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_folder_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SitePatch<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_folder_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    domains: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    time_zone: Option<String>,
    #[serde(default)]
    last_published: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    parent_folder_id: Option<String>,
    #[serde(default)]
    custom_domains: Vec<String>,
}

impl SiteRecord {
    fn outputs(&self) -> SiteOutputs {
        SiteOutputs {
            assigned_short_name: self.short_name.clone(),
            time_zone: self.time_zone.clone(),
            last_published: self.last_published.clone(),
            last_updated: self.last_updated.clone(),
            preview_url: self.preview_url.clone(),
            custom_domains: self.custom_domains.clone(),
        }
    }
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("workspaceId", Mutability::Identity),
    FieldSpec::new("templateName", Mutability::ForceReplace),
    FieldSpec::new("displayName", Mutability::InPlace),
    FieldSpec::new("parentFolderId", Mutability::InPlace),
    FieldSpec::new("publish", Mutability::InPlace),
    FieldSpec::new("publishDomains", Mutability::InPlace),
    FieldSpec::new("shortName", Mutability::Computed),
];

fn check_workspace_id(args: &SiteArgs) -> Result<(), String> {
    validation::required("workspace id", &args.workspace_id)
}

fn check_display_name(args: &SiteArgs) -> Result<(), String> {
    validation::display_name(&args.display_name)
}

fn check_short_name(args: &SiteArgs) -> Result<(), String> {
    args.short_name
        .as_deref()
        .map_or(Ok(()), validation::short_name)
}

static SPEC: ResourceSpec<SiteArgs> = ResourceSpec {
    kind: "site",
    collection: COLLECTION,
    fields: FIELDS,
    validators: &[
        FieldValidator {
            field: "workspaceId",
            check: check_workspace_id,
        },
        FieldValidator {
            field: "displayName",
            check: check_display_name,
        },
        FieldValidator {
            field: "shortName",
            check: check_short_name,
        },
    ],
};

fn site_path(site_id: &str) -> String {
    format!("/v2/sites/{site_id}")
}

/// Fields the remote does not echo back are carried from `prior`.
fn observed_from(workspace_id: &str, record: &SiteRecord, prior: Option<&SiteArgs>) -> ObservedState<Site> {
    Observed {
        inputs: SiteArgs {
            workspace_id: workspace_id.to_owned(),
            display_name: record.display_name.clone(),
            short_name: prior.and_then(|args| args.short_name.clone()),
            parent_folder_id: record.parent_folder_id.clone(),
            template_name: prior.and_then(|args| args.template_name.clone()),
            publish: prior.is_some_and(|args| args.publish),
            publish_domains: prior
                .map(|args| args.publish_domains.clone())
                .unwrap_or_default(),
        },
        outputs: record.outputs(),
    }
}

impl ResourceKind for Site {
    type Desired = SiteArgs;
    type Outputs = SiteOutputs;

    fn spec() -> &'static ResourceSpec<SiteArgs> {
        &SPEC
    }

    fn parent_id(desired: &SiteArgs) -> &str {
        &desired.workspace_id
    }

    fn preview_outputs(desired: &SiteArgs, prior: Option<&SiteOutputs>) -> SiteOutputs {
        prior.cloned().unwrap_or_else(|| SiteOutputs {
            assigned_short_name: desired.short_name.clone(),
            ..SiteOutputs::default()
        })
    }

    fn create_request(desired: &SiteArgs) -> Result<ApiRequest, CodecError> {
        let payload = NewSite {
            name: &desired.display_name,
            template_name: desired.template_name.as_deref(),
            parent_folder_id: desired.parent_folder_id.as_deref(),
        };
        Ok(ApiRequest::with_json(
            Method::POST,
            format!("/v2/workspaces/{}/sites", desired.workspace_id),
            &payload,
        )?)
    }

    fn parse_created(
        desired: &SiteArgs,
        response: &ApiResponse,
    ) -> Result<(String, ObservedState<Self>), CodecError> {
        let record: SiteRecord = response.json()?;
        if record.id.is_empty() {
            return Err(CodecError(String::from(
                "create response did not include a site id",
            )));
        }
        let observed = Observed {
            inputs: desired.clone(),
            outputs: record.outputs(),
        };
        Ok((record.id, observed))
    }

    fn read_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::GET, site_path(handle.remote_id()))
    }

    fn parse_read(
        handle: &ResourceHandle,
        response: &ApiResponse,
        prior: Option<&ObservedState<Self>>,
    ) -> Result<Option<ObservedState<Self>>, CodecError> {
        let record: SiteRecord = response.json()?;
        if !record.id.is_empty() && record.id != handle.remote_id() {
            return Ok(None);
        }
        Ok(Some(observed_from(
            handle.parent_id(),
            &record,
            prior.map(|state| &state.inputs),
        )))
    }

    fn update_request(handle: &ResourceHandle, desired: &SiteArgs) -> Result<ApiRequest, CodecError> {
        let payload = SitePatch {
            name: &desired.display_name,
            parent_folder_id: desired.parent_folder_id.as_deref(),
        };
        Ok(ApiRequest::with_json(
            Method::PATCH,
            site_path(handle.remote_id()),
            &payload,
        )?)
    }

    fn parse_updated(
        desired: &SiteArgs,
        previous: &ObservedState<Self>,
        response: &ApiResponse,
    ) -> Result<ObservedState<Self>, CodecError> {
        let outputs = if response.is_empty() {
            previous.outputs.clone()
        } else {
            response.json::<SiteRecord>()?.outputs()
        };
        Ok(Observed {
            inputs: desired.clone(),
            outputs,
        })
    }

    fn delete_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::DELETE, site_path(handle.remote_id()))
    }

    fn secondary_action(
        handle: &ResourceHandle,
        desired: &SiteArgs,
    ) -> Result<Option<SecondaryAction>, CodecError> {
        if !desired.publish {
            return Ok(None);
        }
        let request = ApiRequest::with_json(
            Method::POST,
            format!("{}/publish", site_path(handle.remote_id())),
            &PublishRequest {
                domains: &desired.publish_domains,
            },
        )?;
        Ok(Some(SecondaryAction {
            name: PUBLISH_ACTION,
            request,
        }))
    }
}
