//! 图内省：能力探测式的只读遍历，产出一张节点/边快照而不侵入信号路径。
//!
//! # 设计背景（Why）
//! Java 版本靠 `instanceof`/`Scannable` 做运行时能力探测；Rust 没有开放式的 `instanceof`，这里用
//! "每种能力一个 `as_xxx` 方法、默认返回 `None`"的模式来表达同样的意图——这正是教师仓库里
//! `ObservabilityFacade` 一类门面 trait 惯用的对象安全能力发现手法的延伸。
//!
//! # 契约说明（What）
//! - [`Introspectable`] 是根能力：任何想被遍历器看到的组件都要实现它，所有探测方法都有默认实现
//!   （返回 `None`/`false`），具体组件按需覆盖。
//! - 数值型探测（`scan_requested` 等）返回 `Option<DemandValue>`：`None` 表示"未知，序列化时省略该
//!   字段"，`DemandValue::Unbounded` 序列化为字符串 `"unbounded"`，`DemandValue::Exact(n)` 序列化为
//!   数字。
//! - 上/下游引用通过 [`NodeHandle`] 返回：可能是一个存活组件的引用（`Live`），也可能是一个虚引用
//!   （`Virtual`，如跨线程边界、尚未建立的占位连接），后者在快照中具现为一个仅有名字的桩节点，
//!   与其边的类型都标记为 `EdgeType::Reference`。
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration;

/// 需求/容量一类数值的呈现：区分"精确值"、"无界"与"未知"（未知由 `Option::None` 表达，不在此枚举中）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemandValue {
    Unbounded,
    Exact(u64),
}

/// `DemandValue` 的 JSON 呈现：`Unbounded` 序列化为字符串字面量 `"unbounded"`，`Exact(n)` 序列化为
/// 数字，而不是走 `#[derive(Serialize)]` 默认的带标签枚举形状。
#[cfg(feature = "introspection_json")]
impl serde::Serialize for DemandValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            DemandValue::Unbounded => serializer.serialize_str("unbounded"),
            DemandValue::Exact(n) => serializer.serialize_u64(*n),
        }
    }
}

/// 一条上/下游引用：指向一个存活的可内省组件，或者一个无法解析为具体引用的虚拟占位。
pub enum NodeHandle<'a> {
    Live(&'a dyn Introspectable),
    Virtual(&'static str),
}

/// 拥有单一上游的组件。
pub trait HasUpstream {
    fn upstream(&self) -> Option<NodeHandle<'_>>;
}

/// 拥有多个上游的组件（扇入）。
pub trait HasUpstreams {
    fn upstreams(&self) -> Vec<NodeHandle<'_>>;
}

/// 拥有单一下游的组件。
pub trait HasDownstream {
    fn downstream(&self) -> Option<NodeHandle<'_>>;
}

/// 拥有多个下游的组件（扇出）。
pub trait HasDownstreams {
    fn downstreams(&self) -> Vec<NodeHandle<'_>>;
}

/// 反馈环：某个下游的输出被重新接回自身的输入，形成一条 `feedbackLoop` 类型的边。
pub trait HasLoopback {
    fn loop_input(&self) -> Option<NodeHandle<'_>>;
    fn loop_output(&self) -> Option<NodeHandle<'_>>;
}

/// 可内省的根能力。所有方法都有默认实现，具体组件按自身持有的状态选择性覆盖。
pub trait Introspectable: Send + Sync {
    /// The node's kind/type descriptor (e.g. `"iteratorSource"`), distinct from `scan_name`'s
    /// optional user-assigned label. Always rendered; components that don't override it show
    /// up as `"unknown"` in the snapshot.
    fn scan_origin(&self) -> Option<&str> {
        None
    }
    fn scan_name(&self) -> Option<&str> {
        None
    }
    fn scan_capacity(&self) -> Option<u64> {
        None
    }
    fn scan_buffered(&self) -> Option<u64> {
        None
    }
    fn scan_requested(&self) -> Option<DemandValue> {
        None
    }
    fn scan_upstream_limit(&self) -> Option<u64> {
        None
    }
    fn scan_expected_upstream(&self) -> Option<u64> {
        None
    }
    fn scan_period(&self) -> Option<Duration> {
        None
    }
    fn scan_active(&self) -> Option<bool> {
        None
    }
    fn scan_terminated(&self) -> Option<bool> {
        None
    }
    fn scan_cancelled(&self) -> Option<bool> {
        None
    }
    fn scan_failed(&self) -> Option<bool> {
        None
    }

    /// trace-only 节点仅在 trace 模式开启时出现在快照中；关闭时遍历器直接穿过它，把它的邻居接到
    /// 它最近的非 trace-only 祖先上。
    fn trace_only(&self) -> bool {
        false
    }

    fn as_upstream(&self) -> Option<&dyn HasUpstream> {
        None
    }
    fn as_upstreams(&self) -> Option<&dyn HasUpstreams> {
        None
    }
    fn as_downstream(&self) -> Option<&dyn HasDownstream> {
        None
    }
    fn as_downstreams(&self) -> Option<&dyn HasDownstreams> {
        None
    }
    fn as_loopback(&self) -> Option<&dyn HasLoopback> {
        None
    }
}

pub type NodeId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeType {
    Inner,
    FeedbackLoop,
    Reference,
}

#[cfg(feature = "introspection_json")]
impl serde::Serialize for EdgeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match self {
            EdgeType::Inner => "inner",
            EdgeType::FeedbackLoop => "feedbackLoop",
            EdgeType::Reference => "reference",
        })
    }
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub id: NodeId,
    /// Kind/type descriptor; `"unknown"` when the component doesn't override `scan_origin`.
    pub origin: String,
    pub name: Option<String>,
    pub capacity: Option<u64>,
    pub buffered: Option<u64>,
    pub requested: Option<DemandValue>,
    pub upstream_limit: Option<u64>,
    pub expected_upstream: Option<u64>,
    pub period: Option<Duration>,
    pub active: Option<bool>,
    pub terminated: Option<bool>,
    pub cancelled: Option<bool>,
    pub failed: Option<bool>,
    /// 虚引用具现出来的桩节点没有真实组件背书，只有名字。
    pub stub: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: Option<EdgeType>,
}

/// 一次遍历产出的完整快照。
#[derive(Clone, Debug)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// 遍历过程中是否检测到环（通过重入已访问节点判定）。
    pub cyclic: bool,
    pub trace: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub cyclic: bool,
}

impl GraphSnapshot {
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            cyclic: self.cyclic,
        }
    }

    /// 剔除已终止的节点及其关联边，返回被剔除节点的 id 集合。普通节点在"已终止且已取消"时剔除；
    /// 引用/桩节点（`stub == true`）没有自身的终止状态，在它所有入边的源端点都已终止且已取消时剔除。
    pub fn remove_terminated_nodes(&mut self) -> Vec<NodeId> {
        let dead: BTreeMap<NodeId, bool> = self
            .nodes
            .iter()
            .map(|node| (node.id, node.terminated.unwrap_or(false) && node.cancelled.unwrap_or(false)))
            .collect();

        let mut inbound_sources: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for edge in &self.edges {
            inbound_sources.entry(edge.to).or_default().push(edge.from);
        }

        let mut removed = Vec::new();
        self.nodes.retain(|node| {
            let prune = if node.stub {
                match inbound_sources.get(&node.id) {
                    Some(sources) if !sources.is_empty() => {
                        sources.iter().all(|source| dead.get(source).copied().unwrap_or(false))
                    }
                    _ => false,
                }
            } else {
                dead[&node.id]
            };
            if prune {
                removed.push(node.id);
            }
            !prune
        });
        let removed_set: BTreeMap<NodeId, ()> = removed.iter().map(|id| (*id, ())).collect();
        self.edges
            .retain(|edge| !removed_set.contains_key(&edge.from) && !removed_set.contains_key(&edge.to));
        removed
    }

    #[cfg(feature = "introspection_json")]
    pub fn to_json(&self) -> alloc::string::String {
        json::render(self)
    }
}

/// 遍历一个可内省的根节点，产出完整快照。
///
/// `trace` 为 `false` 时 trace-only 节点被跳过：它的邻居被直接缝合到它最近的非 trace-only 祖先上。
pub fn walk(root: &dyn Introspectable, trace: bool) -> GraphSnapshot {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    // 以组件的胖指针数据地址作身份键，检测重入（环）。`alloc::collections::BTreeMap` 足以覆盖
    // no_std 场景，无需引入哈希表依赖。
    let mut visited: BTreeMap<usize, NodeId> = BTreeMap::new();
    let mut next_id: NodeId = 0;
    let mut cyclic = false;

    visit(
        root,
        None,
        trace,
        &mut nodes,
        &mut edges,
        &mut visited,
        &mut next_id,
        &mut cyclic,
    );

    GraphSnapshot {
        nodes,
        edges,
        cyclic,
        trace,
    }
}

fn identity_key(node: &dyn Introspectable) -> usize {
    node as *const dyn Introspectable as *const () as usize
}

fn snapshot_node(id: NodeId, node: &dyn Introspectable, stub: bool) -> GraphNode {
    GraphNode {
        id,
        origin: node
            .scan_origin()
            .map(alloc::string::ToString::to_string)
            .unwrap_or_else(|| String::from("unknown")),
        name: node.scan_name().map(alloc::string::ToString::to_string),
        capacity: node.scan_capacity(),
        buffered: node.scan_buffered(),
        requested: node.scan_requested(),
        upstream_limit: node.scan_upstream_limit(),
        expected_upstream: node.scan_expected_upstream(),
        period: node.scan_period(),
        active: node.scan_active(),
        terminated: node.scan_terminated(),
        cancelled: node.scan_cancelled(),
        failed: node.scan_failed(),
        stub,
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    node: &dyn Introspectable,
    ancestor: Option<NodeId>,
    trace: bool,
    nodes: &mut Vec<GraphNode>,
    edges: &mut Vec<GraphEdge>,
    visited: &mut BTreeMap<usize, NodeId>,
    next_id: &mut NodeId,
    cyclic: &mut bool,
) -> NodeId {
    let key = identity_key(node);
    if let Some(existing) = visited.get(&key) {
        *cyclic = true;
        return *existing;
    }

    let skip = node.trace_only() && !trace;
    let effective_id = if skip {
        ancestor.unwrap_or_else(|| {
            // Trace-only 根节点没有祖先可以附着；退化为一个不出现在 nodes 中的占位 id。
            let id = *next_id;
            *next_id += 1;
            id
        })
    } else {
        let id = *next_id;
        *next_id += 1;
        nodes.push(snapshot_node(id, node, false));
        id
    };
    visited.insert(key, effective_id);

    let parent_for_children = effective_id;

    if let Some(loopback) = node.as_loopback() {
        link(
            loopback.loop_input(),
            parent_for_children,
            Some(EdgeType::FeedbackLoop),
            true,
            trace,
            nodes,
            edges,
            visited,
            next_id,
            cyclic,
        );
        link(
            loopback.loop_output(),
            parent_for_children,
            Some(EdgeType::FeedbackLoop),
            false,
            trace,
            nodes,
            edges,
            visited,
            next_id,
            cyclic,
        );
    }

    if let Some(up) = node.as_upstream() {
        link(
            up.upstream(),
            parent_for_children,
            None,
            true,
            trace,
            nodes,
            edges,
            visited,
            next_id,
            cyclic,
        );
    }
    if let Some(ups) = node.as_upstreams() {
        for handle in ups.upstreams() {
            link(
                Some(handle),
                parent_for_children,
                Some(EdgeType::Inner),
                true,
                trace,
                nodes,
                edges,
                visited,
                next_id,
                cyclic,
            );
        }
    }
    if let Some(down) = node.as_downstream() {
        link(
            down.downstream(),
            parent_for_children,
            None,
            false,
            trace,
            nodes,
            edges,
            visited,
            next_id,
            cyclic,
        );
    }
    if let Some(downs) = node.as_downstreams() {
        for handle in downs.downstreams() {
            link(
                Some(handle),
                parent_for_children,
                Some(EdgeType::Inner),
                false,
                trace,
                nodes,
                edges,
                visited,
                next_id,
                cyclic,
            );
        }
    }

    effective_id
}

#[allow(clippy::too_many_arguments)]
fn link(
    handle: Option<NodeHandle<'_>>,
    parent: NodeId,
    forced_type: Option<EdgeType>,
    is_upstream: bool,
    trace: bool,
    nodes: &mut Vec<GraphNode>,
    edges: &mut Vec<GraphEdge>,
    visited: &mut BTreeMap<usize, NodeId>,
    next_id: &mut NodeId,
    cyclic: &mut bool,
) {
    let Some(handle) = handle else {
        return;
    };
    let neighbour_id = match handle {
        NodeHandle::Live(other) => visit(other, Some(parent), trace, nodes, edges, visited, next_id, cyclic),
        NodeHandle::Virtual(name) => {
            let id = *next_id;
            *next_id += 1;
            let mut stub = snapshot_node(id, &StubMarker, true);
            stub.name = Some(alloc::string::String::from(name));
            nodes.push(stub);
            edges.push(if is_upstream {
                GraphEdge {
                    from: id,
                    to: parent,
                    edge_type: Some(EdgeType::Reference),
                }
            } else {
                GraphEdge {
                    from: parent,
                    to: id,
                    edge_type: Some(EdgeType::Reference),
                }
            });
            return;
        }
    };
    let edge = if is_upstream {
        GraphEdge {
            from: neighbour_id,
            to: parent,
            edge_type: forced_type,
        }
    } else {
        GraphEdge {
            from: parent,
            to: neighbour_id,
            edge_type: forced_type,
        }
    };
    edges.push(edge);
}

struct StubMarker;
impl Introspectable for StubMarker {
    fn scan_origin(&self) -> Option<&str> {
        Some("reference")
    }
}

#[cfg(feature = "introspection_json")]
mod json {
    //! `GraphSnapshot` 的 JSON 呈现：内部 repr + `From` 转换，而不是直接在 [`super::GraphSnapshot`]/
    //! [`super::GraphNode`] 上 `#[derive(Serialize)]`，与教师仓库
    //! `configuration::value::serde_repr`（`ConfigValueRepr`/`ConfigMetadataRepr`）同一手法：公共类型
    //! 不绑定序列化方案，需要时通过一个只在这个子模块里可见的 repr 类型转换后再交给 `serde_json`。
    use super::{DemandValue, EdgeType, GraphEdge, GraphNode, GraphSnapshot, NodeId};
    use alloc::string::String;
    use alloc::vec::Vec;
    use core::time::Duration;
    use serde::Serialize;

    pub fn render(snapshot: &GraphSnapshot) -> String {
        serde_json::to_string(&SnapshotRepr::from(snapshot)).unwrap_or_default()
    }

    #[derive(Serialize)]
    struct SnapshotRepr<'a> {
        edges: Vec<EdgeRepr>,
        nodes: Vec<NodeRepr<'a>>,
        trace: bool,
        cyclic: bool,
    }

    impl<'a> From<&'a GraphSnapshot> for SnapshotRepr<'a> {
        fn from(snapshot: &'a GraphSnapshot) -> Self {
            Self {
                edges: snapshot.edges.iter().map(EdgeRepr::from).collect(),
                nodes: snapshot.nodes.iter().map(NodeRepr::from).collect(),
                trace: snapshot.trace,
                cyclic: snapshot.cyclic,
            }
        }
    }

    #[derive(Serialize)]
    struct EdgeRepr {
        from: NodeId,
        to: NodeId,
        #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
        edge_type: Option<EdgeType>,
    }

    impl From<&GraphEdge> for EdgeRepr {
        fn from(edge: &GraphEdge) -> Self {
            Self {
                from: edge.from,
                to: edge.to,
                edge_type: edge.edge_type,
            }
        }
    }

    /// `Duration` 的线上表示：`{secs, nanos}`，与教师仓库 `ConfigValueRepr::Duration` 的字段形状一致。
    #[derive(Serialize)]
    struct DurationRepr {
        secs: u64,
        nanos: u32,
    }

    impl From<Duration> for DurationRepr {
        fn from(period: Duration) -> Self {
            Self {
                secs: period.as_secs(),
                nanos: period.subsec_nanos(),
            }
        }
    }

    #[derive(Serialize)]
    struct NodeRepr<'a> {
        id: NodeId,
        origin: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        capacity: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        buffered: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        requested: Option<DemandValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        upstream_limit: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected_upstream: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        period: Option<DurationRepr>,
        #[serde(skip_serializing_if = "Option::is_none")]
        active: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        terminated: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cancelled: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        failed: Option<bool>,
        stub: bool,
    }

    impl<'a> From<&'a GraphNode> for NodeRepr<'a> {
        fn from(node: &'a GraphNode) -> Self {
            Self {
                id: node.id,
                origin: node.origin.as_str(),
                name: node.name.as_deref(),
                capacity: node.capacity,
                buffered: node.buffered,
                requested: node.requested,
                upstream_limit: node.upstream_limit,
                expected_upstream: node.expected_upstream,
                period: node.period.map(DurationRepr::from),
                active: node.active,
                terminated: node.terminated,
                cancelled: node.cancelled,
                failed: node.failed,
                stub: node.stub,
            }
        }
    }
}
