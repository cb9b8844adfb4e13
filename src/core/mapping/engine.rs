//! Mapping rules applied to input records
//!
//! Source fields are looked up in a static accessor table keyed by their
//! camelCase name. Target paths are dispatched on their section prefix (the
//! part before the last `.`) to a [`Section`], which knows where that section
//! lives in the record document and which field names it accepts.

use crate::core::mapping::document::Node;
use crate::domain::{BatchfeedError, FeedKind, InputRecord, MappingRule, Result};
use chrono::NaiveDate;

type Accessor = fn(&InputRecord) -> Option<String>;

fn date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format("%Y-%m-%d").to_string())
}

static ACCESSORS: &[(&str, Accessor)] = &[
    ("clientID", |r| r.client_id.map(|v| v.to_string())),
    ("titlePrefix", |r| r.title_prefix.clone()),
    ("firstName", |r| r.first_name.clone()),
    ("middleName", |r| r.middle_name.clone()),
    ("lastName", |r| r.last_name.clone()),
    ("titleSuffix", |r| r.title_suffix.clone()),
    ("citizenship1", |r| r.citizenship1.clone()),
    ("citizenship2", |r| r.citizenship2.clone()),
    ("onboardingDate", |r| date(r.onboarding_date)),
    ("status", |r| r.status.clone()),
    ("nameAtBirth", |r| r.name_at_birth.clone()),
    ("nickName", |r| r.nick_name.clone()),
    ("gender", |r| r.gender.clone()),
    ("dateOfBirth", |r| date(r.date_of_birth)),
    ("language", |r| r.language.clone()),
    ("occupation", |r| r.occupation.clone()),
    ("countryOfTax", |r| r.country_of_tax.clone()),
    ("sourceOfFundsCountry", |r| r.source_of_funds_country.clone()),
    ("fatcaStatus", |r| r.fatca_status.clone()),
    ("crsStatus", |r| r.crs_status.clone()),
    ("addressLine1", |r| r.address_line1.clone()),
    ("city", |r| r.city.clone()),
    ("zipCode", |r| r.zip_code.clone()),
    ("province", |r| r.province.clone()),
    ("country", |r| r.country.clone()),
    ("nationality", |r| r.nationality.clone()),
    ("legDocType", |r| r.leg_doc_type.clone()),
    ("idNumber", |r| r.id_number.clone()),
    ("placeOfBirth", |r| r.place_of_birth.clone()),
    ("cityOfBirth", |r| r.city_of_birth.clone()),
    ("countryOfBirth", |r| r.country_of_birth.clone()),
];

/// Names accepted as `sourceField`
pub fn source_fields() -> impl Iterator<Item = &'static str> {
    ACCESSORS.iter().map(|(name, _)| *name)
}

fn accessor(name: &str) -> Option<Accessor> {
    ACCESSORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, accessor)| *accessor)
}

/// One navigation step inside a record document
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Child of a group
    Child(&'static str),
    /// Item 0 of a list child, created when missing
    First(&'static str),
}

/// Field names a section accepts
#[derive(Debug, Clone, Copy)]
pub enum FieldSet {
    /// Known aliases, each with its path below the section base
    Fixed(&'static [(&'static str, &'static [Step])]),
    /// Any field name, stored as a child of the section base
    Open,
}

/// Dispatch entry for one target path prefix
#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub prefix: &'static str,
    pub base: &'static [Step],
    pub fields: FieldSet,
}

use Step::{Child as C, First as F};

const IND: &[Step] = &[C("Data"), C("PrtInfo"), C("Ind")];

static SCREENING_SECTIONS: &[Section] = &[
    Section {
        prefix: "record",
        base: &[],
        fields: FieldSet::Fixed(&[
            ("uniRcrdId", &[C("Meta"), C("UniRcrdId")]),
            ("type", &[C("Meta"), C("Type")]),
            ("recStat", &[C("Meta"), C("RecStat")]),
            ("comment", &[C("Data"), C("Comment")]),
        ]),
    },
    Section {
        prefix: "name",
        base: &[C("Data"), C("PrtInfo"), C("Ind"), F("Names")],
        fields: FieldSet::Fixed(&[
            ("type", &[C("Type")]),
            ("full", &[C("Full")]),
            ("tit", &[C("Tit")]),
            ("fir", &[C("Fir")]),
            ("mid", &[C("Mid")]),
            ("sur", &[C("Sur")]),
            ("ma", &[C("Ma")]),
        ]),
    },
    Section {
        prefix: "individual",
        base: IND,
        fields: FieldSet::Fixed(&[
            ("gender", &[C("G")]),
            ("dob", &[C("DOB")]),
            ("placeOfBirth", &[C("Plc")]),
            ("cntr", &[C("Cntr")]),
            ("occupation", &[C("Occ")]),
            ("nationality", &[F("Nats"), C("Cntr")]),
            ("address", &[F("Addrs"), C("Line")]),
        ]),
    },
    Section {
        prefix: "individual.nationality",
        base: &[C("Data"), C("PrtInfo"), C("Ind"), F("Nats")],
        fields: FieldSet::Fixed(&[
            ("cntr", &[C("Cntr")]),
            ("legDoc", &[C("LegDoc")]),
            ("idNr", &[C("IdNr")]),
            ("ca", &[C("CA")]),
        ]),
    },
    Section {
        prefix: "individual.address",
        base: &[C("Data"), C("PrtInfo"), C("Ind"), F("Addrs")],
        fields: FieldSet::Fixed(&[
            ("type", &[C("Type")]),
            ("line", &[C("Line")]),
            ("city", &[C("City")]),
            ("zip", &[C("ZipCode")]),
            ("zipCode", &[C("ZipCode")]),
            ("prov", &[C("Prov")]),
            ("cntr", &[C("Cntr")]),
        ]),
    },
    Section {
        prefix: "account",
        base: &[C("Data"), C("PrtInfo"), C("Acc")],
        fields: FieldSet::Fixed(&[
            ("type", &[C("Type")]),
            ("nr", &[C("Nr")]),
            ("ai", &[C("AI")]),
            ("sow", &[C("SoW")]),
        ]),
    },
    Section {
        prefix: "kyc",
        base: &[C("Data"), C("KYCData")],
        fields: FieldSet::Fixed(&[
            ("pepFlag", &[C("PEPFlag")]),
            ("nextReview", &[C("NextRvw"), C("KYC")]),
        ]),
    },
    Section {
        prefix: "jurisdiction",
        base: &[C("Data"), F("JuriInfo")],
        fields: FieldSet::Fixed(&[
            ("relSrcId", &[C("RelSrcId")]),
            ("recCntrOrg", &[C("RecCntrOrg")]),
            ("recBD", &[C("RecBD")]),
            ("dble", &[C("DBLE")]),
            ("dbleLoc", &[C("DBLELoc")]),
            ("lbj", &[C("LBJ")]),
            ("lafcj", &[C("LAFCJ")]),
            ("bsrl", &[C("BSRL")]),
            ("rr", &[C("RR")]),
            ("hrpi", &[C("HRPI")]),
        ]),
    },
];

static RISK_SECTIONS: &[Section] = &[
    Section {
        prefix: "clientDetails",
        base: &[F("clientRiskRatingRequest"), C("clientDetails")],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "entityRiskType",
        base: &[F("clientRiskRatingRequest"), C("entityRiskType")],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "industryRiskType",
        base: &[F("clientRiskRatingRequest"), C("industryRiskType")],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "geoRiskType",
        base: &[F("clientRiskRatingRequest"), C("geoRiskType")],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "geoRiskType.addressType",
        base: &[
            F("clientRiskRatingRequest"),
            C("geoRiskType"),
            C("addressType"),
        ],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "channelRiskType",
        base: &[F("clientRiskRatingRequest"), C("channelRiskType")],
        fields: FieldSet::Open,
    },
    Section {
        prefix: "productRiskType",
        base: &[F("clientRiskRatingRequest"), F("productRiskType")],
        fields: FieldSet::Open,
    },
];

/// Follows `steps` without touching the document; an empty list stands in
/// with its template for the item [`walk`] would create
fn peek<'a>(mut node: &'a Node, steps: &[Step]) -> Option<&'a Node> {
    for step in steps {
        node = match step {
            Step::Child(name) => node.child(name)?,
            Step::First(name) => match node.child(name)? {
                Node::Repeated {
                    template, items, ..
                } => items.first().unwrap_or(&**template),
                _ => return None,
            },
        };
    }
    Some(node)
}

fn walk<'a>(mut node: &'a mut Node, steps: &[Step]) -> Option<&'a mut Node> {
    for step in steps {
        node = match step {
            Step::Child(name) => node.child_mut(name)?,
            Step::First(name) => node.child_mut(name)?.first_mut()?,
        };
    }
    Some(node)
}

/// Applies mapping rules for one feed kind
#[derive(Debug, Clone, Copy)]
pub struct MappingEngine {
    kind: FeedKind,
    sections: &'static [Section],
}

impl MappingEngine {
    pub fn for_feed(kind: FeedKind) -> Self {
        let sections = match kind {
            FeedKind::Screening => SCREENING_SECTIONS,
            FeedKind::Risk => RISK_SECTIONS,
        };
        Self { kind, sections }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Checks a rule set before it is stored or used
    ///
    /// # Errors
    ///
    /// Returns [`BatchfeedError::Configuration`] naming the first rule whose
    /// target path is malformed or whose source field is not an accessor.
    pub fn validate(&self, rules: &[MappingRule]) -> Result<()> {
        for (index, rule) in rules.iter().enumerate() {
            let segments: Vec<&str> = rule.target_path.split('.').collect();
            let malformed = !(2..=3).contains(&segments.len())
                || segments.iter().any(|s| s.trim().is_empty());
            if malformed {
                return Err(BatchfeedError::Configuration(format!(
                    "Mapping rule {} ({} feed): invalid target path '{}', \
                     expected section.field or section.subsection.field",
                    index + 1,
                    self.kind,
                    rule.target_path
                )));
            }

            if let Some(source) = source_name(rule) {
                if accessor(source).is_none() {
                    return Err(BatchfeedError::Configuration(format!(
                        "Mapping rule {} ({} feed): unknown source field '{}' for target '{}'",
                        index + 1,
                        self.kind,
                        source,
                        rule.target_path
                    )));
                }
            }

            if self.section_for(&rule.target_path).is_none() {
                tracing::warn!(
                    feed = %self.kind,
                    target = %rule.target_path,
                    "Mapping rule targets an unknown section and will be skipped"
                );
            }
        }
        Ok(())
    }

    /// Reads the rule's source field off the record
    ///
    /// Every failure to resolve (no source field, unknown accessor, empty
    /// value on the record) yields `None`.
    pub fn resolve(record: &InputRecord, rule: &MappingRule) -> Option<String> {
        let source = source_name(rule)?;
        accessor(source).and_then(|read| read(record))
    }

    /// Resolved source value, or the rule's default when that is `None`
    pub fn value_for(record: &InputRecord, rule: &MappingRule) -> Option<String> {
        Self::resolve(record, rule).or_else(|| rule.default_value.clone())
    }

    /// Writes `value` into `document` at the rule's target path
    ///
    /// Repeated sections always receive the value in item 0. A `None` value
    /// leaves the document untouched. Returns whether the value was written.
    pub fn apply(&self, document: &mut Node, rule: &MappingRule, value: Option<String>) -> bool {
        let Some(value) = value else {
            return false;
        };
        let Some((section, field)) = self.section_for(&rule.target_path) else {
            tracing::warn!(
                feed = %self.kind,
                target = %rule.target_path,
                "Unknown mapping section, value ignored"
            );
            return false;
        };

        let path: &[Step] = match section.fields {
            FieldSet::Open => &[],
            FieldSet::Fixed(aliases) => {
                match aliases.iter().find(|(alias, _)| *alias == field) {
                    Some((_, path)) => path,
                    None => {
                        tracing::warn!(
                            feed = %self.kind,
                            target = %rule.target_path,
                            "Unknown field in mapping section, value ignored"
                        );
                        return false;
                    }
                }
            }
        };

        // Nothing is created unless the whole path exists
        let target = peek(document, section.base).and_then(|base| peek(base, path));
        let writable = match (section.fields, target) {
            (FieldSet::Open, Some(Node::Group { .. })) => true,
            (FieldSet::Fixed(_), Some(Node::Text(_))) => true,
            _ => false,
        };
        if !writable {
            tracing::warn!(
                feed = %self.kind,
                section = section.prefix,
                target = %rule.target_path,
                "Target missing from document skeleton, value ignored"
            );
            return false;
        }

        let Some(base) = walk(document, section.base) else {
            return false;
        };
        match section.fields {
            FieldSet::Open => base.set_field(field, Some(value)),
            FieldSet::Fixed(_) => walk(base, path).is_some_and(|slot| slot.set_text(Some(value))),
        }
    }

    /// Runs every rule against one record document, in declaration order
    pub fn apply_all(&self, document: &mut Node, record: &InputRecord, rules: &[MappingRule]) {
        for rule in rules {
            let value = Self::value_for(record, rule);
            self.apply(document, rule, value);
        }
    }

    fn section_for<'p>(&self, target_path: &'p str) -> Option<(&'static Section, &'p str)> {
        let (prefix, field) = target_path.rsplit_once('.')?;
        self.sections
            .iter()
            .find(|s| s.prefix == prefix)
            .map(|s| (s, field))
    }
}

fn source_name(rule: &MappingRule) -> Option<&str> {
    rule.source_field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
