//! The per-site robots.txt file.
//!
//! Hosts describe the file as traditional robots.txt text. The API exchanges
//! structured rules, so content is parsed before every write and formatted
//! back into canonical text from every response. Comparisons use the
//! canonical form so whitespace and directive case never register as drift.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{
    CodecError, FieldValidator, Observed, ObservedState, ResourceKind, ResourceSpec, timestamp_now,
    validation,
};
use crate::diff::{FieldSpec, FieldValues, Mutability};
use crate::handle::ResourceHandle;
use crate::transport::{ApiRequest, ApiResponse, Method};

/// Collection segment of robots.txt handles.
pub const COLLECTION: &str = "robots_txt";

/// Remote identifier of the single robots.txt file of a site.
pub const REMOTE_ID: &str = "default";

/// Marker for the robots.txt kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RobotsTxt;

/// Desired robots.txt file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsTxtArgs {
    /// Site the file belongs to.
    pub site_id: String,
    /// File body in robots.txt syntax.
    pub content: String,
}

impl FieldValues for RobotsTxtArgs {
    fn field_value(&self, field: &str) -> Value {
        match field {
            "siteId" => json!(self.site_id),
            "content" => json!(canonicalise(&self.content)),
            _ => Value::Null,
        }
    }
}

/// Outputs recorded for a robots.txt file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsTxtOutputs {
    /// Time of the last write in RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Directives for one user agent.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsRule {
    /// Crawler the group applies to, for example `*`.
    pub user_agent: String,
    /// Paths crawlers may visit.
    #[serde(default)]
    pub allows: Vec<String>,
    /// Paths crawlers must skip.
    #[serde(default)]
    pub disallows: Vec<String>,
}

/// Structured robots.txt document as exchanged with the API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RobotsDocument {
    /// User-agent groups in file order.
    #[serde(default)]
    pub rules: Vec<RobotsRule>,
    /// Sitemap URL, empty when absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sitemap: String,
}

impl RobotsDocument {
    /// Returns `true` when the document has no groups and no sitemap.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.sitemap.is_empty()
    }
}

/// Parses robots.txt text.
///
/// Directives are matched case-insensitively. `Allow` and `Disallow` lines
/// before the first `User-agent` are ignored, as are empty paths, comments,
/// and unknown directives. The last `Sitemap` wins.
#[must_use]
pub fn parse_content(content: &str) -> RobotsDocument {
    let mut document = RobotsDocument::default();
    let mut current: Option<RobotsRule> = None;

    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, raw_value)) = line.split_once(':') else {
            continue;
        };
        let value = raw_value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "sitemap" => value.clone_into(&mut document.sitemap),
            "user-agent" => {
                document.rules.extend(current.take());
                current = Some(RobotsRule {
                    user_agent: value.to_owned(),
                    ..RobotsRule::default()
                });
            }
            "allow" if !value.is_empty() => {
                if let Some(rule) = current.as_mut() {
                    rule.allows.push(value.to_owned());
                }
            }
            "disallow" if !value.is_empty() => {
                if let Some(rule) = current.as_mut() {
                    rule.disallows.push(value.to_owned());
                }
            }
            _ => {}
        }
    }

    document.rules.extend(current);
    document
}

/// Formats a document as canonical robots.txt text.
#[must_use]
pub fn format_content(document: &RobotsDocument) -> String {
    let mut out = String::new();
    for rule in &document.rules {
        out.push_str(&format!("User-agent: {}\n", rule.user_agent));
        for path in &rule.allows {
            out.push_str(&format!("Allow: {path}\n"));
        }
        for path in &rule.disallows {
            out.push_str(&format!("Disallow: {path}\n"));
        }
    }
    if !document.sitemap.is_empty() {
        if !document.rules.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("Sitemap: {}\n", document.sitemap));
    }
    out
}

fn canonicalise(content: &str) -> String {
    format_content(&parse_content(content))
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("siteId", Mutability::Identity),
    FieldSpec::new("content", Mutability::InPlace),
];

fn check_site_id(args: &RobotsTxtArgs) -> Result<(), String> {
    validation::site_id(&args.site_id)
}

fn check_content(args: &RobotsTxtArgs) -> Result<(), String> {
    validation::required("content", &args.content)?;
    if parse_content(&args.content).is_empty() {
        return Err(String::from(
            "content has no User-agent group or Sitemap line (e.g. \"User-agent: *\\nDisallow: /admin\")",
        ));
    }
    Ok(())
}

static SPEC: ResourceSpec<RobotsTxtArgs> = ResourceSpec {
    kind: "robots.txt",
    collection: COLLECTION,
    fields: FIELDS,
    validators: &[
        FieldValidator {
            field: "siteId",
            check: check_site_id,
        },
        FieldValidator {
            field: "content",
            check: check_content,
        },
    ],
};

fn file_path(site_id: &str) -> String {
    format!("/v2/sites/{site_id}/robots_txt")
}

fn put_request(desired: &RobotsTxtArgs) -> Result<ApiRequest, CodecError> {
    Ok(ApiRequest::with_json(
        Method::PUT,
        file_path(&desired.site_id),
        &parse_content(&desired.content),
    )?)
}

fn observed_from(
    site_id: &str,
    response: &ApiResponse,
    outputs: RobotsTxtOutputs,
) -> Result<Option<ObservedState<RobotsTxt>>, CodecError> {
    let document: RobotsDocument = if response.is_empty() {
        RobotsDocument::default()
    } else {
        response.json()?
    };
    if document.is_empty() {
        return Ok(None);
    }
    Ok(Some(Observed {
        inputs: RobotsTxtArgs {
            site_id: site_id.to_owned(),
            content: format_content(&document),
        },
        outputs,
    }))
}

fn written(desired: &RobotsTxtArgs) -> ObservedState<RobotsTxt> {
    Observed {
        inputs: RobotsTxtArgs {
            site_id: desired.site_id.clone(),
            content: canonicalise(&desired.content),
        },
        outputs: RobotsTxtOutputs {
            last_modified: Some(timestamp_now()),
        },
    }
}

impl ResourceKind for RobotsTxt {
    type Desired = RobotsTxtArgs;
    type Outputs = RobotsTxtOutputs;

    fn spec() -> &'static ResourceSpec<RobotsTxtArgs> {
        &SPEC
    }

    fn parent_id(desired: &RobotsTxtArgs) -> &str {
        &desired.site_id
    }

    fn preview_remote_id() -> String {
        REMOTE_ID.to_owned()
    }

    fn preview_outputs(_desired: &RobotsTxtArgs, _prior: Option<&RobotsTxtOutputs>) -> RobotsTxtOutputs {
        RobotsTxtOutputs {
            last_modified: Some(timestamp_now()),
        }
    }

    fn create_request(desired: &RobotsTxtArgs) -> Result<ApiRequest, CodecError> {
        put_request(desired)
    }

    fn parse_created(
        desired: &RobotsTxtArgs,
        response: &ApiResponse,
    ) -> Result<(String, ObservedState<Self>), CodecError> {
        let outputs = RobotsTxtOutputs {
            last_modified: Some(timestamp_now()),
        };
        let observed = observed_from(&desired.site_id, response, outputs)?
            .unwrap_or_else(|| written(desired));
        Ok((REMOTE_ID.to_owned(), observed))
    }

    fn read_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::GET, file_path(handle.parent_id()))
    }

    fn parse_read(
        handle: &ResourceHandle,
        response: &ApiResponse,
        prior: Option<&ObservedState<Self>>,
    ) -> Result<Option<ObservedState<Self>>, CodecError> {
        let outputs = prior.map(|state| state.outputs.clone()).unwrap_or_default();
        observed_from(handle.parent_id(), response, outputs)
    }

    fn update_request(
        _handle: &ResourceHandle,
        desired: &RobotsTxtArgs,
    ) -> Result<ApiRequest, CodecError> {
        put_request(desired)
    }

    fn parse_updated(
        desired: &RobotsTxtArgs,
        _previous: &ObservedState<Self>,
        response: &ApiResponse,
    ) -> Result<ObservedState<Self>, CodecError> {
        let outputs = RobotsTxtOutputs {
            last_modified: Some(timestamp_now()),
        };
        Ok(observed_from(&desired.site_id, response, outputs)?.unwrap_or_else(|| written(desired)))
    }

    fn delete_request(handle: &ResourceHandle) -> ApiRequest {
        ApiRequest::new(Method::DELETE, file_path(handle.parent_id()))
    }
}
