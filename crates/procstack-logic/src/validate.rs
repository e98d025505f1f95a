//! Sanity sweep over parsed model definitions.
//!
//! Pure functions that take definitions and return validation errors.
//! Parsing already substitutes defaults for malformed fields; this pass
//! catches the data that parsed fine but will behave strangely: zero
//! face diameters, colliding segment orders, dangling default names.
//! Hosts typically run it once after registry load and surface the
//! findings in a log or a modder console.

use std::collections::HashSet;
use std::sync::Arc;

use crate::definition::Definition;

/// A definition validation finding.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

/// Check basic geometry fields.
pub fn check_geometry(def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (field, value) in [
        ("baseDiameter", def.base_diameter),
        ("upperDiameter", def.upper_diameter),
        ("lowerDiameter", def.lower_diameter),
    ] {
        if value <= 0.0 {
            errors.push(ValidationError {
                category: "geometry",
                severity: Severity::Error,
                message: format!(
                    "model '{}': {field} is {value}; diameter matching will divide by it",
                    def.name
                ),
            });
        }
    }
    if def.actual_height <= 0.0 {
        errors.push(ValidationError {
            category: "geometry",
            severity: Severity::Warning,
            message: format!("model '{}': actualHeight {} is not positive", def.name, def.actual_height),
        });
    }
    errors
}

/// Check compound segment data: duplicate orders make the stacking
/// walk ambiguous, and a compound definition whose segment heights do
/// not cover the base height will stack to an unexpected total.
pub fn check_segments(def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if def.compound_segments.is_empty() {
        return errors;
    }

    let mut orders = HashSet::new();
    for segment in &def.compound_segments {
        if !orders.insert(segment.order) {
            errors.push(ValidationError {
                category: "segments",
                severity: Severity::Error,
                message: format!(
                    "model '{}': segment order {} appears more than once",
                    def.name, segment.order
                ),
            });
        }
        if segment.base_height < 0.0 {
            errors.push(ValidationError {
                category: "segments",
                severity: Severity::Error,
                message: format!(
                    "model '{}': segment '{}' has negative height {}",
                    def.name, segment.name, segment.base_height
                ),
            });
        }
    }

    if !def.compound_segments.iter().any(|s| s.can_scale_height) {
        errors.push(ValidationError {
            category: "segments",
            severity: Severity::Warning,
            message: format!(
                "model '{}': no segment can scale; height requests will be ignored",
                def.name
            ),
        });
    }

    let total: f32 = def.compound_segments.iter().map(|s| s.base_height).sum();
    if (total - def.base_height).abs() > 1e-3 {
        errors.push(ValidationError {
            category: "segments",
            severity: Severity::Warning,
            message: format!(
                "model '{}': segment heights sum to {total}, baseHeight is {}",
                def.name, def.base_height
            ),
        });
    }
    errors
}

/// Check that default names resolve to something.
pub fn check_defaults(def: &Definition) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if def.layout(&def.default_layout_name).is_none() {
        errors.push(ValidationError {
            category: "defaults",
            severity: Severity::Error,
            message: format!(
                "model '{}': default layout '{}' does not exist",
                def.name, def.default_layout_name
            ),
        });
    }
    if !def.default_texture_set_name.is_empty()
        && def.texture_set(&def.default_texture_set_name).is_none()
    {
        errors.push(ValidationError {
            category: "defaults",
            severity: Severity::Warning,
            message: format!(
                "model '{}': default texture set '{}' does not exist",
                def.name, def.default_texture_set_name
            ),
        });
    }
    errors
}

/// Run every check over a definition set.
pub fn validate_definitions(defs: &[Arc<Definition>]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for def in defs {
        errors.extend(check_geometry(def));
        errors.extend(check_segments(def));
        errors.extend(check_defaults(def));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigNode;

    fn definition(json: &str) -> Arc<Definition> {
        Definition::from_config(&ConfigNode::from_json(json).unwrap())
    }

    #[test]
    fn clean_definition_passes() {
        let def = definition(
            r#"{"name":"MODEL","values":[["name","ok"],["baseDiameter","2.5"]],"nodes":[]}"#,
        );
        assert!(validate_definitions(&[def]).is_empty());
    }

    #[test]
    fn zero_diameter_flagged() {
        let def = definition(
            r#"{"name":"MODEL","values":[["name","flat"],["upperDiameter","0"]],"nodes":[]}"#,
        );
        let errors = check_geometry(&def);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn duplicate_segment_orders_flagged() {
        let def = definition(
            r#"{"name":"MODEL","values":[["name","seg"],["baseHeight","2"]],"nodes":[
                {"name":"SEGMENT","values":[["name","a"],["height","1"],["order","0"],["canScaleHeight","true"]],"nodes":[]},
                {"name":"SEGMENT","values":[["name","b"],["height","1"],["order","0"]],"nodes":[]}
            ]}"#,
        );
        let errors = check_segments(&def);
        assert!(errors
            .iter()
            .any(|e| e.severity == Severity::Error && e.message.contains("order")));
    }

    #[test]
    fn all_static_compound_is_a_warning() {
        let def = definition(
            r#"{"name":"MODEL","values":[["name","rigid"],["baseHeight","1"]],"nodes":[
                {"name":"SEGMENT","values":[["name","a"],["height","1"],["order","0"]],"nodes":[]}
            ]}"#,
        );
        let errors = check_segments(&def);
        assert!(errors
            .iter()
            .any(|e| e.severity == Severity::Warning && e.message.contains("no segment")));
    }

    #[test]
    fn segment_height_mismatch_is_a_warning() {
        let def = definition(
            r#"{"name":"MODEL","values":[["name","gap"],["baseHeight","4"]],"nodes":[
                {"name":"SEGMENT","values":[["name","a"],["height","1"],["order","0"],["canScaleHeight","true"]],"nodes":[]}
            ]}"#,
        );
        let errors = check_segments(&def);
        assert!(errors.iter().any(|e| e.message.contains("sum to")));
    }
}
