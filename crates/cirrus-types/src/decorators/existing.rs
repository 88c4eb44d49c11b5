//! `@existing("ref")`: the resource is imported rather than created.

use super::{
    check_shape, positional, str_of, ArgForm, ArgShape, Decorator, DecoratorSpec, LitKind,
    Restriction, Target,
};
use crate::error::CheckError;
use cirrus_ast::ast::Annotation;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "existing",
    shape: ArgShape::Forms(&[ArgForm::Literal(&[LitKind::String])]),
    targets: &[Target::Resource],
    restriction: Restriction::Unrestricted,
    instances_only: false,
    deferred: false,
};

/// Kind of an import reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ImportRef {
    Arn,
    S3Url,
    Url,
    TagClause,
    Ec2Id,
    KmsAlias,
    LogGroup,
    Name,
}

lazy_static! {
    /// Patterns in match priority; the first match wins.
    static ref PATTERNS: Vec<(ImportRef, Regex)> = [
        (
            ImportRef::Arn,
            r"^arn:aws[a-z-]*:[a-z0-9-]+:[a-z0-9-]*:(\d{12})?:.+$",
        ),
        (ImportRef::S3Url, r"^s3://[a-z0-9][a-z0-9.-]{1,61}[a-z0-9](/\S*)?$"),
        (ImportRef::Url, r"^https?://[^\s/?#]+[^\s]*$"),
        (ImportRef::TagClause, r"^tag:[A-Za-z0-9_.:/+@-]+=\S*$"),
        (
            ImportRef::Ec2Id,
            r"^(i|vol|sg|subnet|vpc|ami|eni|igw|rtb|snap|nat|eipalloc)-([0-9a-f]{8}|[0-9a-f]{17})$",
        ),
        (ImportRef::KmsAlias, r"^alias/[A-Za-z0-9/_-]+$"),
        (ImportRef::LogGroup, r"^/[A-Za-z0-9_./#-]+$"),
        (ImportRef::Name, r"^[A-Za-z0-9][A-Za-z0-9_.-]*$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| {
        (
            kind,
            Regex::new(pattern).expect("import reference pattern should compile"),
        )
    })
    .collect();
}

impl ImportRef {
    /// Classify `reference`, or `None` if no pattern matches.
    pub fn classify(reference: &str) -> Option<ImportRef> {
        PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(reference))
            .map(|(kind, _)| *kind)
    }

    pub fn describe(self) -> &'static str {
        match self {
            ImportRef::Arn => "ARN",
            ImportRef::S3Url => "S3 URL",
            ImportRef::Url => "URL",
            ImportRef::TagClause => "tag clause",
            ImportRef::Ec2Id => "EC2 id",
            ImportRef::KmsAlias => "KMS alias",
            ImportRef::LogGroup => "log group",
            ImportRef::Name => "name",
        }
    }
}

impl fmt::Display for ImportRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Existing;

impl Decorator for Existing {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_shape(&SPEC, ann)?;
        let Some(reference) = positional(&ann.args).and_then(str_of) else {
            return Ok(());
        };
        if reference.trim().is_empty() {
            return Err(CheckError::type_error(
                "@existing requires a non-blank import reference",
                ann.span,
            ));
        }
        if ImportRef::classify(reference).is_none() {
            return Err(CheckError::type_error(
                format!(
                    "@existing value \"{}\" is not a recognised import reference (expected an ARN, URL, tag clause, resource id, alias, log group or name)",
                    reference
                ),
                ann.span,
            ));
        }
        Ok(())
    }
}
