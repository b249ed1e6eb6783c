use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mermaid_hier_layout::config::LayoutConfig;
use mermaid_hier_layout::interchange::{graph_from_json, graph_to_json};
use mermaid_hier_layout::ir::{Direction, Graph, Subgraph};
use mermaid_hier_layout::layout::compute_layout;
use std::hint::black_box;

fn dense_flowchart(nodes: usize, extra_edges: usize) -> Graph {
    let mut graph = Graph::new();
    graph.direction = Direction::LR;
    for i in 0..nodes {
        graph.ensure_node(&format!("N{i}"), Some(format!("Node {i}")), None);
    }
    for i in 0..nodes.saturating_sub(1) {
        graph.add_edge(&format!("N{i}"), &format!("N{}", i + 1));
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 2)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            graph.add_edge(&format!("N{i}"), &format!("N{j}"));
            count += 1;
        }
    }
    graph
}

/// Chain of `groups` clusters, every other one carrying its own direction.
fn clustered_flowchart(groups: usize, per_group: usize) -> Graph {
    let mut graph = Graph::new();
    let mut previous: Option<String> = None;
    for g in 0..groups {
        let mut sub = Subgraph::new(&format!("G{g}"), &format!("Cluster {g}"));
        if g % 2 == 1 {
            sub.direction = Some(Direction::LR);
        }
        for n in 0..per_group {
            let id = format!("G{g}N{n}");
            graph.ensure_node(&id, None, None);
            if let Some(prev) = previous.as_deref() {
                graph.add_edge(prev, &id);
            }
            sub.node_ids.push(id.clone());
            previous = Some(id);
        }
        graph.subgraphs.push(sub);
    }
    graph
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    let cases = [
        ("dense_20", dense_flowchart(20, 30)),
        ("dense_80", dense_flowchart(80, 160)),
        ("clusters_4x5", clustered_flowchart(4, 5)),
        ("clusters_12x6", clustered_flowchart(12, 6)),
    ];
    for (name, graph) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), graph, |b, data| {
            b.iter(|| {
                let layout = compute_layout(black_box(data), &config).expect("layout failed");
                black_box(layout.edges.len());
            });
        });
    }
    group.finish();
}

fn bench_interchange(c: &mut Criterion) {
    let mut group = c.benchmark_group("interchange");
    let payload = graph_to_json(&clustered_flowchart(12, 6)).expect("encode failed");
    group.bench_function("decode_clusters_12x6", |b| {
        b.iter(|| {
            let graph = graph_from_json(black_box(&payload)).expect("decode failed");
            black_box(graph.nodes.len());
        });
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_layout, bench_interchange
);
criterion_main!(benches);
