use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeSizingConfig {
    pub font_size: f64,
    pub font_weight: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    /// Side of the fixed square used for state start/end markers.
    pub pseudostate_size: f64,
    pub diamond_extra: f64,
    pub circle_extra: f64,
    pub double_circle_gap: f64,
}

impl Default for NodeSizingConfig {
    fn default() -> Self {
        Self {
            font_size: 13.0,
            font_weight: 500.0,
            padding_x: 20.0,
            padding_y: 10.0,
            pseudostate_size: 28.0,
            diamond_extra: 8.0,
            circle_extra: 8.0,
            double_circle_gap: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeLabelConfig {
    pub font_size: f64,
    pub font_weight: f64,
    pub padding_x: f64,
    pub padding_y: f64,
}

impl Default for EdgeLabelConfig {
    fn default() -> Self {
        Self {
            font_size: 11.0,
            font_weight: 400.0,
            padding_x: 8.0,
            padding_y: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupConfig {
    pub font_size: f64,
    pub font_weight: f64,
    pub padding: f64,
    /// Space between the header text block and the first member.
    pub header_gap: f64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            font_weight: 600.0,
            padding: 16.0,
            header_gap: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoutingConfig {
    /// A segment whose horizontal and vertical deltas both exceed this is diagonal.
    pub diagonal_tolerance: f64,
    /// Distance kept between the outermost group boxes and the margin lanes.
    pub margin_gap: f64,
    /// Extra offset per pair of repaired edges sharing a margin side.
    pub margin_spacing: f64,
    pub arrowhead_margin: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            diagonal_tolerance: 1.0,
            margin_gap: 20.0,
            margin_spacing: 8.0,
            arrowhead_margin: 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlignmentConfig {
    pub enabled: bool,
    /// Fraction of the layer spacing under which two nodes share a layer.
    pub threshold_ratio: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BundlingConfig {
    pub enabled: bool,
    /// Clearance between a moved junction and the group box it was pushed out of.
    pub boundary_gap: f64,
}

impl Default for BundlingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            boundary_gap: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub padding: f64,
    pub node_spacing: f64,
    pub layer_spacing: f64,
    pub component_spacing: f64,
    pub node: NodeSizingConfig,
    pub edge_label: EdgeLabelConfig,
    pub group: GroupConfig,
    pub routing: RoutingConfig,
    pub alignment: AlignmentConfig,
    pub bundling: BundlingConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: 40.0,
            node_spacing: 24.0,
            layer_spacing: 40.0,
            component_spacing: 24.0,
            node: NodeSizingConfig::default(),
            edge_label: EdgeLabelConfig::default(),
            group: GroupConfig::default(),
            routing: RoutingConfig::default(),
            alignment: AlignmentConfig::default(),
            bundling: BundlingConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn with_options(mut self, options: &LayoutOptions) -> Self {
        if let Some(v) = options.padding {
            self.padding = v;
        }
        if let Some(v) = options.node_spacing {
            self.node_spacing = v;
        }
        if let Some(v) = options.layer_spacing {
            self.layer_spacing = v;
        }
        if let Some(v) = options.component_spacing {
            self.component_spacing = v;
        }
        self
    }

    pub fn alignment_threshold(&self) -> f64 {
        self.layer_spacing * self.alignment.threshold_ratio
    }
}

/// Spacing overrides a host passes alongside its render options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_spacing: Option<f64>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };

    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<LayoutConfig> {
    match serde_json::from_str::<LayoutConfig>(contents) {
        Ok(config) => Ok(config),
        Err(json_err) => json5::from_str::<LayoutConfig>(contents).map_err(|json5_err| {
            anyhow::anyhow!("invalid layout config: {json_err} (json5: {json5_err})")
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = parse_config(r#"{"layerSpacing": 60, "bundling": {"enabled": false}}"#)
            .expect("config parses");
        assert_eq!(config.layer_spacing, 60.0);
        assert_eq!(config.node_spacing, 24.0);
        assert!(!config.bundling.enabled);
        assert_eq!(config.bundling.boundary_gap, 10.0);
    }

    #[test]
    fn json5_configs_are_accepted() {
        let config = parse_config("{ padding: 12, // tight\n alignment: { thresholdRatio: 0.5 } }")
            .expect("json5 config parses");
        assert_eq!(config.padding, 12.0);
        assert_eq!(config.alignment_threshold(), 20.0);
    }

    #[test]
    fn options_overlay_spacing() {
        let options = LayoutOptions {
            node_spacing: Some(10.0),
            ..Default::default()
        };
        let config = LayoutConfig::default().with_options(&options);
        assert_eq!(config.node_spacing, 10.0);
        assert_eq!(config.padding, 40.0);
        let value = serde_json::to_value(&options).unwrap();
        assert!(value.get("padding").is_none());
    }

    #[test]
    fn garbage_config_is_an_error() {
        assert!(parse_config("not a config").is_err());
    }
}
