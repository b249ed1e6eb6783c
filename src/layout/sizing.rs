use crate::config::LayoutConfig;
use crate::ir::NodeShape;
use crate::text_metrics::{TextMetrics, TextSize};

/// Box reserved for a node: the measured label plus padding, grown to fit the shape outline.
pub(super) fn node_size(
    shape: NodeShape,
    label: &str,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
) -> TextSize {
    let sizing = &config.node;
    if shape.is_pseudostate() {
        return TextSize {
            width: sizing.pseudostate_size,
            height: sizing.pseudostate_size,
        };
    }

    let text = metrics.measure(label, sizing.font_size, sizing.font_weight);
    let content_w = text.width + sizing.padding_x * 2.0;
    let content_h = text.height + sizing.padding_y * 2.0;

    let (width, height) = match shape {
        NodeShape::Diamond => {
            // Smallest rhombus enclosing the content box has diagonals of w + h.
            let side = content_w + content_h + sizing.diamond_extra;
            (side, side)
        }
        NodeShape::Circle => {
            let diameter = content_w.hypot(content_h) + sizing.circle_extra;
            (diameter, diameter)
        }
        NodeShape::Doublecircle => {
            let diameter =
                content_w.hypot(content_h) + sizing.circle_extra + sizing.double_circle_gap * 2.0;
            (diameter, diameter)
        }
        NodeShape::Hexagon => (content_w + content_h / 2.0, content_h),
        NodeShape::Trapezoid | NodeShape::TrapezoidAlt | NodeShape::Asymmetric => {
            (content_w + content_h / 2.0, content_h)
        }
        NodeShape::Stadium => (content_w + content_h / 2.0, content_h),
        _ => (content_w, content_h),
    };

    TextSize {
        width: width.max(height),
        height,
    }
}

/// Box the solver reserves inline on a labeled edge.
pub(super) fn edge_label_size(label: &str, config: &LayoutConfig, metrics: &dyn TextMetrics) -> TextSize {
    let style = &config.edge_label;
    let text = metrics.measure(label, style.font_size, style.font_weight);
    TextSize {
        width: text.width + style.padding_x * 2.0,
        height: text.height + style.padding_y * 2.0,
    }
}

/// Group header text block; its height is added to the container's top padding.
pub(super) fn group_header_size(
    label: &str,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
) -> TextSize {
    if label.trim().is_empty() {
        return TextSize::default();
    }
    metrics.measure(label, config.group.font_size, config.group.font_weight)
}
