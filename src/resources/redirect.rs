//! URL redirect rules scoped to a site.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    CodecError, FieldValidator, Observed, ObservedState, ResourceKind, ResourceSpec, timestamp_now,
    validation,
};
use crate::diff::{FieldSpec, FieldValues, Mutability};
use crate::handle::ResourceHandle;
use crate::transport::{ApiRequest, ApiResponse, Method};

/// Collection segment of redirect handles.
pub const COLLECTION: &str = "redirects";

/// Marker for the redirect kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Redirect;

/// Desired redirect rule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectArgs {
    /// Site the rule belongs to.
    pub site_id: String,
    /// Path that triggers the redirect.
    pub source_path: String,
    /// Path the visitor is sent to.
    pub destination_path: String,
    /// HTTP status returned to the visitor (301 or 302).
    pub status_code: u16,
}

impl FieldValues for RedirectArgs {
    fn field_value(&self, field: &str) -> Value {
        match field {
            "siteId" => json!(self.site_id),
            "sourcePath" => json!(self.source_path),
            "destinationPath" => json!(self.destination_path),
            "statusCode" => json!(self.status_code),
            _ => Value::Null,
        }
    }
}

/// Outputs recorded for a redirect.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectOutputs {
    /// Creation time in RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRule<'a> {
    from_url: &'a str,
    to_url: &'a str,
    status_code: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RulePatch<'a> {
    to_url: &'a str,
    status_code: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectRule {
    #[serde(default)]
    id: String,
    #[serde(default)]
    from_url: String,
    #[serde(default)]
    to_url: String,
    #[serde(default)]
    status_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RedirectList {
    #[serde(default)]
    redirects: Vec<RedirectRule>,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("siteId", Mutability::Identity),
    FieldSpec::new("sourcePath", Mutability::Identity),
    FieldSpec::new("destinationPath", Mutability::InPlace),
    FieldSpec::new("statusCode", Mutability::InPlace),
];

fn check_site_id(args: &RedirectArgs) -> Result<(), String> {
    validation::site_id(&args.site_id)
}

fn check_source_path(args: &RedirectArgs) -> Result<(), String> {
    validation::url_path("source path", &args.source_path)
}

fn check_destination_path(args: &RedirectArgs) -> Result<(), String> {
    validation::url_path("destination path", &args.destination_path)
}

fn check_status_code(args: &RedirectArgs) -> Result<(), String> {
    validation::redirect_status(args.status_code)
}

static SPEC: ResourceSpec<RedirectArgs> = ResourceSpec {
    kind: "redirect",
    collection: COLLECTION,
    fields: FIELDS,
    validators: &[
        FieldValidator {
            field: "siteId",
            check: check_site_id,
        },
        FieldValidator {
            field: "sourcePath",
            check: check_source_path,
        },
        FieldValidator {
            field: "destinationPath",
            check: check_destination_path,
        },
        FieldValidator {
            field: "statusCode",
            check: check_status_code,
        },
    ],
};

fn collection_path(site_id: &str) -> String {
    format!("/v2/sites/{site_id}/redirects")
}

fn rule_path(handle: &ResourceHandle) -> String {
    format!("{}/{}", collection_path(handle.parent_id()), handle.remote_id())
}

impl ResourceKind for Redirect {
    type Desired = RedirectArgs;
    type Outputs = RedirectOutputs;

    fn spec() -> &'static ResourceSpec<RedirectArgs> {
        &SPEC
    }

    fn parent_id(desired: &RedirectArgs) -> &str {
        &desired.site_id
    }

    fn preview_outputs(_desired: &RedirectArgs, prior: Option<&RedirectOutputs>) -> RedirectOutputs {
        prior.cloned().unwrap_or_else(|| RedirectOutputs {
            created_on: Some(timestamp_now()),
        })
    }

    fn create_request(desired: &RedirectArgs) -> Result<ApiRequest, CodecError> {
        let payload = NewRule {
            from_url: &desired.source_path,
            to_url: &desired.destination_path,
            status_code: desired.status_code,
        };
        Ok(ApiRequest::with_json(
            Method::POST,
            collection_path(&desired.site_id),
            &payload,
        )?)
    }

    fn parse_created(
        desired: &RedirectArgs,
        response: &ApiResponse,
    ) -> Result<(String, ObservedState<Self>), CodecError> {
        let rule: RedirectRule = response.json()?;
        if rule.id.is_empty() {
            return Err(CodecError(String::from(
                "create response did not include a redirect id",
            )));
        }
        let observed = Observed {
            inputs: desired.clone(),
            outputs: RedirectOutputs {
                created_on: Some(timestamp_now()),
            },
        };
        Ok((rule.id, observed))
    }

    fn read_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::GET, collection_path(handle.parent_id()))
    }

    fn parse_read(
        handle: &ResourceHandle,
        response: &ApiResponse,
        prior: Option<&ObservedState<Self>>,
    ) -> Result<Option<ObservedState<Self>>, CodecError> {
        let listing: RedirectList = response.json()?;
        let Some(rule) = listing
            .redirects
            .into_iter()
            .find(|rule| rule.id == handle.remote_id())
        else {
            return Ok(None);
        };

        let status_code = rule
            .status_code
            .or_else(|| prior.map(|state| state.inputs.status_code))
            .unwrap_or_default();
        Ok(Some(Observed {
            inputs: RedirectArgs {
                site_id: handle.parent_id().to_owned(),
                source_path: rule.from_url,
                destination_path: rule.to_url,
                status_code,
            },
            outputs: prior.map(|state| state.outputs.clone()).unwrap_or_default(),
        }))
    }

    fn update_request(
        handle: &ResourceHandle,
        desired: &RedirectArgs,
    ) -> Result<ApiRequest, CodecError> {
        let payload = RulePatch {
            to_url: &desired.destination_path,
            status_code: desired.status_code,
        };
        Ok(ApiRequest::with_json(
            Method::PATCH,
            rule_path(handle),
            &payload,
        )?)
    }

    fn parse_updated(
        desired: &RedirectArgs,
        previous: &ObservedState<Self>,
        _response: &ApiResponse,
    ) -> Result<ObservedState<Self>, CodecError> {
        Ok(Observed {
            inputs: desired.clone(),
            outputs: previous.outputs.clone(),
        })
    }

    fn delete_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::DELETE, rule_path(handle))
    }
}
