//! Runtime values and the operations between them.
//!
//! A [`Value`] is an owned reference into the [`Heap`]. Ownership is
//! explicit: `clone_ref` takes a new reference, `release` gives one up, and
//! every operator takes borrowed inputs and returns a newly-owned result.
//! Binding a value to an identifier transfers the reference.
//!
//! A list is a vector of listnode slots; each listnode owns exactly one
//! value. Subscripting a list yields a reference to the *node*, so that
//! assignment through the subscript updates the underlying cell. Operators
//! silently unwrap a listnode to its inner value at the use site.

use strum::Display;

use crate::{
    error::{RunError, RunResult},
    heap::{Heap, HeapId},
    module::ModuleId,
    scanner::{Scanner, decode_escape},
};

/// Type tags; the display form is the name surfaced by `type()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ValueKind {
    Char,
    Int,
    Float,
    Str,
    List,
    ListNode,
    Position,
    None,
}

/// An owned reference to a heap value.
///
/// Not `Copy` and not `Clone`: references are duplicated with `clone_ref`
/// and given up with `release` so that every reference-count change is
/// visible in the source.
#[derive(Debug)]
pub(crate) struct Value {
    id: HeapId,
}

impl Value {
    pub fn new(id: HeapId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    /// Transfers ownership of the reference to the caller as a raw id,
    /// e.g. into a list's node vector.
    pub fn into_id(self) -> HeapId {
        self.id
    }

    pub fn clone_ref(&self, heap: &Heap) -> Self {
        heap.inc_ref(self.id);
        Self { id: self.id }
    }

    pub fn release(self, heap: &mut Heap) {
        heap.dec_ref(self.id);
    }
}

/// The payload stored in a heap slot.
#[derive(Debug)]
pub(crate) enum HeapData {
    Char(u8),
    Int(i64),
    Float(f64),
    Str(String),
    List(List),
    ListNode(ListNode),
    Position(PositionData),
    None,
}

impl HeapData {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Char(_) => ValueKind::Char,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::ListNode(_) => ValueKind::ListNode,
            Self::Position(_) => ValueKind::Position,
            Self::None => ValueKind::None,
        }
    }

    /// Ids of owned children, released when this value is freed.
    pub fn child_ids(&self, out: &mut Vec<HeapId>) {
        match self {
            Self::List(list) => out.extend(list.nodes.iter().copied()),
            Self::ListNode(node) => out.push(node.value.id()),
            _ => {}
        }
    }
}

/// A list: an ordered sequence of owned listnode slots.
#[derive(Debug, Default)]
pub(crate) struct List {
    pub nodes: Vec<HeapId>,
}

/// One list cell, owning exactly one value.
#[derive(Debug)]
pub(crate) struct ListNode {
    pub value: Value,
}

/// A snapshot of the reader and scanner, stored as a first-class value.
/// Function identifiers are bound to one of these.
#[derive(Debug)]
pub(crate) struct PositionData {
    pub module: ModuleId,
    pub pos: usize,
    pub bol: usize,
    pub scanner: Scanner,
}

/// Binary operators routed through [`binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    And,
    Or,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Unwraps a listnode to its inner value id; other ids pass through.
fn listnode_inner(heap: &Heap, id: HeapId) -> HeapId {
    match heap.get(id) {
        HeapData::ListNode(node) => node.value.id(),
        _ => id,
    }
}

/// The id a value is used as at operator sites: listnodes unwrap to their
/// inner value, everything else is itself.
pub(crate) fn resolve_id(heap: &Heap, v: &Value) -> HeapId {
    listnode_inner(heap, v.id())
}

fn is_number_kind(kind: ValueKind) -> bool {
    matches!(kind, ValueKind::Char | ValueKind::Int | ValueKind::Float)
}

pub(crate) fn is_number(heap: &Heap, v: &Value) -> bool {
    is_number_kind(heap.kind(resolve_id(heap, v)))
}

pub(crate) fn is_sequence(heap: &Heap, v: &Value) -> bool {
    matches!(heap.kind(resolve_id(heap, v)), ValueKind::Str | ValueKind::List)
}

fn unsupported(op: BinOp, left: ValueKind, right: ValueKind) -> RunError {
    RunError::type_error(format!(
        "unsupported operand type(s) for operation {}: {left} and {right}",
        op.symbol()
    ))
}

/// Central dispatch for every binary operator.
pub(crate) fn binary(heap: &mut Heap, op: BinOp, a: &Value, b: &Value) -> RunResult<Value> {
    match op {
        BinOp::Add => add(heap, a, b),
        BinOp::Mul => mul(heap, a, b),
        BinOp::Sub | BinOp::Div | BinOp::Mod => {
            let (ra, rb) = (resolve_id(heap, a), resolve_id(heap, b));
            if is_number_kind(heap.kind(ra)) && is_number_kind(heap.kind(rb)) {
                arith(heap, op, ra, rb)
            } else {
                Err(unsupported(op, heap.kind(ra), heap.kind(rb)))
            }
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(heap, op, a, b),
        BinOp::In => in_op(heap, a, b),
        BinOp::And | BinOp::Or => logical(heap, op, a, b),
    }
}

fn add(heap: &mut Heap, a: &Value, b: &Value) -> RunResult<Value> {
    let (ra, rb) = (resolve_id(heap, a), resolve_id(heap, b));
    let (ka, kb) = (heap.kind(ra), heap.kind(rb));
    if is_number_kind(ka) && is_number_kind(kb) {
        arith(heap, BinOp::Add, ra, rb)
    } else if ka == ValueKind::Str || kb == ValueKind::Str {
        // the non-string side takes its printed form
        let mut text = text_for_concat(heap, ra);
        text.push_str(&text_for_concat(heap, rb));
        heap.allocate(HeapData::Str(text))
    } else if ka == ValueKind::List && kb == ValueKind::List {
        let mut inner: Vec<HeapId> = list_inner_ids(heap, ra);
        inner.extend(list_inner_ids(heap, rb));
        copy_into_list(heap, &inner)
    } else {
        Err(unsupported(BinOp::Add, ka, kb))
    }
}

fn mul(heap: &mut Heap, a: &Value, b: &Value) -> RunResult<Value> {
    let (ra, rb) = (resolve_id(heap, a), resolve_id(heap, b));
    let (ka, kb) = (heap.kind(ra), heap.kind(rb));
    if is_number_kind(ka) && is_number_kind(kb) {
        return arith(heap, BinOp::Mul, ra, rb);
    }
    let (seq, count, seq_kind) = if is_number_kind(ka) && matches!(kb, ValueKind::Str | ValueKind::List) {
        (rb, ra, kb)
    } else if is_number_kind(kb) && matches!(ka, ValueKind::Str | ValueKind::List) {
        (ra, rb, ka)
    } else {
        return Err(unsupported(BinOp::Mul, ka, kb));
    };
    let times = as_int_id(heap, count)?.max(0) as usize;
    match seq_kind {
        ValueKind::Str => {
            let text = match heap.get(seq) {
                HeapData::Str(s) => s.repeat(times),
                _ => String::new(),
            };
            heap.allocate(HeapData::Str(text))
        }
        _ => {
            let inner = list_inner_ids(heap, seq);
            let mut repeated = Vec::with_capacity(inner.len() * times);
            for _ in 0..times {
                repeated.extend(inner.iter().copied());
            }
            copy_into_list(heap, &repeated)
        }
    }
}

/// Result kind of an arithmetic operation: float if either operand is a
/// float, else int if either is an int, else char.
fn coerce(ka: ValueKind, kb: ValueKind) -> ValueKind {
    if ka == ValueKind::Float || kb == ValueKind::Float {
        ValueKind::Float
    } else if ka == ValueKind::Int || kb == ValueKind::Int {
        ValueKind::Int
    } else {
        ValueKind::Char
    }
}

fn arith(heap: &mut Heap, op: BinOp, ra: HeapId, rb: HeapId) -> RunResult<Value> {
    if matches!(op, BinOp::Div | BinOp::Mod) && as_int_id(heap, rb)? == 0 {
        return Err(RunError::division_by_zero());
    }
    match coerce(heap.kind(ra), heap.kind(rb)) {
        ValueKind::Float => {
            let (x, y) = (as_float_id(heap, ra)?, as_float_id(heap, rb)?);
            let result = match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => x / y,
                _ => return Err(RunError::mod_not_allowed("% operator only allowed on integers")),
            };
            heap.allocate(HeapData::Float(result))
        }
        ValueKind::Int => {
            let (x, y) = (as_int_id(heap, ra)?, as_int_id(heap, rb)?);
            let result = match op {
                BinOp::Add => x.wrapping_add(y),
                BinOp::Sub => x.wrapping_sub(y),
                BinOp::Mul => x.wrapping_mul(y),
                BinOp::Div => x.wrapping_div(y),
                _ => x.wrapping_rem(y),
            };
            heap.allocate(HeapData::Int(result))
        }
        _ => {
            let (x, y) = (as_char_id(heap, ra)?, as_char_id(heap, rb)?);
            let result = match op {
                BinOp::Add => x.wrapping_add(y),
                BinOp::Sub => x.wrapping_sub(y),
                BinOp::Mul => x.wrapping_mul(y),
                BinOp::Div => x.wrapping_div(y),
                _ => x % y,
            };
            heap.allocate(HeapData::Char(result))
        }
    }
}

fn apply_cmp<T: PartialOrd>(op: BinOp, x: T, y: T) -> bool {
    match op {
        BinOp::Eq => x == y,
        BinOp::Ne => x != y,
        BinOp::Lt => x < y,
        BinOp::Le => x <= y,
        BinOp::Gt => x > y,
        _ => x >= y,
    }
}

fn compare(heap: &mut Heap, op: BinOp, a: &Value, b: &Value) -> RunResult<Value> {
    let (ra, rb) = (resolve_id(heap, a), resolve_id(heap, b));
    let (ka, kb) = (heap.kind(ra), heap.kind(rb));
    let truth = if is_number_kind(ka) && is_number_kind(kb) {
        match coerce(ka, kb) {
            ValueKind::Float => apply_cmp(op, as_float_id(heap, ra)?, as_float_id(heap, rb)?),
            ValueKind::Int => apply_cmp(op, as_int_id(heap, ra)?, as_int_id(heap, rb)?),
            _ => apply_cmp(op, as_char_id(heap, ra)?, as_char_id(heap, rb)?),
        }
    } else if matches!(op, BinOp::Eq | BinOp::Ne) && ka == kb && matches!(ka, ValueKind::Str | ValueKind::List) {
        let equal = equals(heap, ra, rb)?;
        if op == BinOp::Ne { !equal } else { equal }
    } else {
        return Err(unsupported(op, ka, kb));
    };
    heap.allocate(HeapData::Int(i64::from(truth)))
}

/// Structural equality: numbers by coercion, strings byte-wise, lists
/// pairwise. Mixed kinds beyond numeric coercion are a type error.
fn equals(heap: &Heap, a: HeapId, b: HeapId) -> RunResult<bool> {
    let (ra, rb) = (listnode_inner(heap, a), listnode_inner(heap, b));
    let (ka, kb) = (heap.kind(ra), heap.kind(rb));
    if is_number_kind(ka) && is_number_kind(kb) {
        return Ok(match coerce(ka, kb) {
            ValueKind::Float => as_float_id(heap, ra)? == as_float_id(heap, rb)?,
            ValueKind::Int => as_int_id(heap, ra)? == as_int_id(heap, rb)?,
            _ => as_char_id(heap, ra)? == as_char_id(heap, rb)?,
        });
    }
    if ka == ValueKind::Str && kb == ValueKind::Str {
        let (HeapData::Str(x), HeapData::Str(y)) = (heap.get(ra), heap.get(rb)) else {
            return Ok(false);
        };
        return Ok(x == y);
    }
    if ka == ValueKind::List && kb == ValueKind::List {
        let (xs, ys) = (list_inner_ids(heap, ra), list_inner_ids(heap, rb));
        if xs.len() != ys.len() {
            return Ok(false);
        }
        for (x, y) in xs.iter().zip(ys.iter()) {
            if !equals(heap, *x, *y)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }
    Err(unsupported(BinOp::Eq, ka, kb))
}

fn in_op(heap: &mut Heap, a: &Value, b: &Value) -> RunResult<Value> {
    let ra = resolve_id(heap, a);
    let rb = resolve_id(heap, b);
    let found = match heap.get(rb) {
        HeapData::Str(s) => {
            let bytes = s.as_bytes().to_vec();
            let mut found = false;
            for byte in bytes {
                if char_equals(heap, ra, byte)? {
                    found = true;
                    break;
                }
            }
            found
        }
        HeapData::List(list) => {
            let nodes = list.nodes.clone();
            let mut found = false;
            for node in nodes {
                let inner = listnode_inner(heap, node);
                if equals(heap, ra, inner)? {
                    found = true;
                    break;
                }
            }
            found
        }
        other => {
            return Err(RunError::type_error(format!("{} is not subscriptable", other.kind())));
        }
    };
    heap.allocate(HeapData::Int(i64::from(found)))
}

/// Equality of a value against one byte of a string.
fn char_equals(heap: &Heap, id: HeapId, byte: u8) -> RunResult<bool> {
    match heap.get(id) {
        HeapData::Char(c) => Ok(*c == byte),
        HeapData::Int(i) => Ok(*i == i64::from(byte)),
        HeapData::Float(f) => Ok(*f == f64::from(byte)),
        other => Err(unsupported(BinOp::Eq, other.kind(), ValueKind::Char)),
    }
}

fn logical(heap: &mut Heap, op: BinOp, a: &Value, b: &Value) -> RunResult<Value> {
    let (ra, rb) = (resolve_id(heap, a), resolve_id(heap, b));
    let (ka, kb) = (heap.kind(ra), heap.kind(rb));
    if !is_number_kind(ka) || !is_number_kind(kb) {
        return Err(unsupported(op, ka, kb));
    }
    let (x, y) = (as_bool_id(heap, ra)?, as_bool_id(heap, rb)?);
    let truth = if op == BinOp::And { x && y } else { x || y };
    heap.allocate(HeapData::Int(i64::from(truth)))
}

/// Logical negation: `!x`.
pub(crate) fn negate(heap: &mut Heap, v: &Value) -> RunResult<Value> {
    let id = resolve_id(heap, v);
    if !is_number_kind(heap.kind(id)) {
        return Err(RunError::type_error(format!(
            "unsupported operand type for operation !: {}",
            heap.kind(id)
        )));
    }
    let truth = as_bool_id(heap, id)?;
    heap.allocate(HeapData::Int(i64::from(!truth)))
}

/// Arithmetic negation: `-x` computed as `0 - x`, keeping the kind.
pub(crate) fn invert(heap: &mut Heap, v: &Value) -> RunResult<Value> {
    let id = resolve_id(heap, v);
    match heap.get(id) {
        HeapData::Char(c) => {
            let result = 0u8.wrapping_sub(*c);
            heap.allocate(HeapData::Char(result))
        }
        HeapData::Int(i) => {
            let result = 0i64.wrapping_sub(*i);
            heap.allocate(HeapData::Int(result))
        }
        HeapData::Float(f) => {
            let result = -*f;
            heap.allocate(HeapData::Float(result))
        }
        other => Err(RunError::type_error(format!(
            "unsupported operand type for operation -: {}",
            other.kind()
        ))),
    }
}

/// `seq[index]`: a char for strings, a listnode reference for lists.
pub(crate) fn item(heap: &mut Heap, seq: &Value, index: i64) -> RunResult<Value> {
    enum Picked {
        Byte(u8),
        Node(HeapId),
    }
    let rs = resolve_id(heap, seq);
    let picked = match heap.get(rs) {
        HeapData::Str(s) => {
            let len = s.len() as i64;
            let i = if index < 0 { index + len } else { index };
            if i < 0 || i >= len {
                return Err(RunError::index_error());
            }
            Picked::Byte(s.as_bytes()[i as usize])
        }
        HeapData::List(list) => {
            let len = list.nodes.len() as i64;
            let i = if index < 0 { index + len } else { index };
            if i < 0 || i >= len {
                return Err(RunError::index_error());
            }
            Picked::Node(list.nodes[i as usize])
        }
        other => {
            return Err(RunError::type_error(format!("type {} is not subscriptable", other.kind())));
        }
    };
    match picked {
        Picked::Byte(byte) => heap.allocate(HeapData::Char(byte)),
        Picked::Node(node) => {
            heap.inc_ref(node);
            Ok(Value::new(node))
        }
    }
}

fn clamp_range(mut start: i64, mut end: i64, len: i64) -> (usize, usize) {
    if start < 0 {
        start += len;
    }
    if end < 0 {
        end += len;
    }
    let start = start.clamp(0, len) as usize;
    let end = end.clamp(0, len) as usize;
    (start, end.max(start))
}

/// `seq[start:end]`: always a deep copy of the selected elements.
pub(crate) fn slice(heap: &mut Heap, seq: &Value, start: i64, end: i64) -> RunResult<Value> {
    let rs = resolve_id(heap, seq);
    match heap.kind(rs) {
        ValueKind::Str => {
            let piece = match heap.get(rs) {
                HeapData::Str(s) => {
                    let (a, b) = clamp_range(start, end, s.len() as i64);
                    String::from_utf8_lossy(&s.as_bytes()[a..b]).into_owned()
                }
                _ => String::new(),
            };
            heap.allocate(HeapData::Str(piece))
        }
        ValueKind::List => {
            let inner = list_inner_ids(heap, rs);
            let (a, b) = clamp_range(start, end, inner.len() as i64);
            copy_into_list(heap, &inner[a..b])
        }
        kind => Err(RunError::type_error(format!("type {kind} is not subscriptable"))),
    }
}

/// Number of items in a sequence.
pub(crate) fn length(heap: &Heap, v: &Value) -> RunResult<i64> {
    let id = resolve_id(heap, v);
    match heap.get(id) {
        HeapData::Str(s) => Ok(s.len() as i64),
        HeapData::List(list) => Ok(list.nodes.len() as i64),
        other => Err(RunError::type_error(format!("type {} is not subscriptable", other.kind()))),
    }
}

/// Inner value ids of a list's nodes, in order.
fn list_inner_ids(heap: &Heap, list_id: HeapId) -> Vec<HeapId> {
    match heap.get(list_id) {
        HeapData::List(list) => list.nodes.iter().map(|&node| listnode_inner(heap, node)).collect(),
        _ => Vec::new(),
    }
}

/// Builds a new list whose elements are deep copies of the given values.
fn copy_into_list(heap: &mut Heap, inner_ids: &[HeapId]) -> RunResult<Value> {
    let mut nodes = Vec::with_capacity(inner_ids.len());
    for &id in inner_ids {
        let copy = deep_copy_id(heap, id)?;
        let node = heap.allocate(HeapData::ListNode(ListNode { value: copy }))?;
        nodes.push(node.into_id());
    }
    heap.allocate(HeapData::List(List { nodes }))
}

/// Appends a value (ownership transfers) to the end of a list.
pub(crate) fn list_append(heap: &mut Heap, list_id: HeapId, value: Value) -> RunResult<()> {
    let node = heap.allocate(HeapData::ListNode(ListNode { value }))?;
    let HeapData::List(list) = heap.get_mut(list_id) else {
        return Err(RunError::system_error("append target is not a list"));
    };
    list.nodes.push(node.into_id());
    Ok(())
}

/// Inserts a value before `index`; the index is clamped to the list.
pub(crate) fn list_insert(heap: &mut Heap, list_id: HeapId, index: i64, value: Value) -> RunResult<()> {
    let node = heap.allocate(HeapData::ListNode(ListNode { value }))?;
    let HeapData::List(list) = heap.get_mut(list_id) else {
        return Err(RunError::system_error("insert target is not a list"));
    };
    let len = list.nodes.len() as i64;
    let i = if index < 0 { index + len } else { index };
    let i = i.clamp(0, len) as usize;
    list.nodes.insert(i, node.into_id());
    Ok(())
}

/// Removes the node at `index` and returns its value; the caller takes
/// ownership.
pub(crate) fn list_remove(heap: &mut Heap, list_id: HeapId, index: i64) -> RunResult<Value> {
    let node_id = {
        let HeapData::List(list) = heap.get_mut(list_id) else {
            return Err(RunError::system_error("remove target is not a list"));
        };
        let len = list.nodes.len() as i64;
        let i = if index < 0 { index + len } else { index };
        if i < 0 || i >= len {
            return Err(RunError::index_error());
        }
        list.nodes.remove(i as usize)
    };
    let placeholder = heap.none_ref();
    let inner = match heap.get_mut(node_id) {
        HeapData::ListNode(node) => std::mem::replace(&mut node.value, placeholder),
        _ => placeholder,
    };
    heap.dec_ref(node_id);
    Ok(inner)
}

/// Deep copy. Defined for char, int, float, str and list; listnodes copy
/// their inner value. Copying none or a position is a type error.
pub(crate) fn deep_copy(heap: &mut Heap, v: &Value) -> RunResult<Value> {
    deep_copy_id(heap, resolve_id(heap, v))
}

fn deep_copy_id(heap: &mut Heap, id: HeapId) -> RunResult<Value> {
    enum Plan {
        Data(HeapData),
        CopyList(Vec<HeapId>),
        Recurse(HeapId),
    }
    let plan = match heap.get(id) {
        HeapData::Char(c) => Plan::Data(HeapData::Char(*c)),
        HeapData::Int(i) => Plan::Data(HeapData::Int(*i)),
        HeapData::Float(f) => Plan::Data(HeapData::Float(*f)),
        HeapData::Str(s) => Plan::Data(HeapData::Str(s.clone())),
        HeapData::List(list) => Plan::CopyList(list.nodes.iter().map(|&node| listnode_inner(heap, node)).collect()),
        HeapData::ListNode(node) => Plan::Recurse(node.value.id()),
        other => return Err(RunError::type_error(format!("cannot copy type {}", other.kind()))),
    };
    match plan {
        Plan::Data(data) => heap.allocate(data),
        Plan::Recurse(inner) => deep_copy_id(heap, inner),
        Plan::CopyList(inner) => copy_into_list(heap, &inner),
    }
}

/// Assignment: writes the source *through* the target object in place, so
/// every reference to the target observes the new content. The target
/// keeps its kind; the source is converted to it.
pub(crate) fn assign(heap: &mut Heap, target: &Value, src: &Value) -> RunResult<()> {
    match heap.kind(target.id()) {
        ValueKind::Char => {
            let c = as_char(heap, src)?;
            if let HeapData::Char(slot) = heap.get_mut(target.id()) {
                *slot = c;
            }
            Ok(())
        }
        ValueKind::Int => {
            let i = as_int(heap, src)?;
            if let HeapData::Int(slot) = heap.get_mut(target.id()) {
                *slot = i;
            }
            Ok(())
        }
        ValueKind::Float => {
            let f = as_float(heap, src)?;
            if let HeapData::Float(slot) = heap.get_mut(target.id()) {
                *slot = f;
            }
            Ok(())
        }
        ValueKind::Str => {
            let text = as_str(heap, src);
            if let HeapData::Str(slot) = heap.get_mut(target.id()) {
                *slot = text;
            }
            Ok(())
        }
        ValueKind::List => {
            let src_id = resolve_id(heap, src);
            if heap.kind(src_id) != ValueKind::List {
                return Err(RunError::value_error(format!(
                    "cannot convert {} to list",
                    heap.kind(src_id)
                )));
            }
            if src_id == target.id() {
                return Ok(());
            }
            let inner = list_inner_ids(heap, src_id);
            let mut new_nodes = Vec::with_capacity(inner.len());
            for id in inner {
                let copy = deep_copy_id(heap, id)?;
                let node = heap.allocate(HeapData::ListNode(ListNode { value: copy }))?;
                new_nodes.push(node.into_id());
            }
            let old_nodes = match heap.get_mut(target.id()) {
                HeapData::List(list) => std::mem::replace(&mut list.nodes, new_nodes),
                _ => Vec::new(),
            };
            for node in old_nodes {
                heap.dec_ref(node);
            }
            Ok(())
        }
        ValueKind::ListNode => {
            let copy = deep_copy(heap, src)?;
            let old = match heap.get_mut(target.id()) {
                HeapData::ListNode(node) => std::mem::replace(&mut node.value, copy),
                _ => copy,
            };
            old.release(heap);
            Ok(())
        }
        kind => Err(RunError::type_error(format!(
            "unsupported operand type(s) for operation =: {kind} and {}",
            heap.kind(resolve_id(heap, src))
        ))),
    }
}

fn as_char_id(heap: &Heap, id: HeapId) -> RunResult<u8> {
    match heap.get(id) {
        HeapData::Char(c) => Ok(*c),
        HeapData::Int(i) => Ok(*i as u8),
        HeapData::Float(f) => Ok(*f as i64 as u8),
        other => Err(RunError::value_error(format!("cannot convert {} to char", other.kind()))),
    }
}

fn as_int_id(heap: &Heap, id: HeapId) -> RunResult<i64> {
    match heap.get(id) {
        HeapData::Char(c) => Ok(i64::from(*c)),
        HeapData::Int(i) => Ok(*i),
        HeapData::Float(f) => Ok(*f as i64),
        other => Err(RunError::value_error(format!("cannot convert {} to integer", other.kind()))),
    }
}

fn as_float_id(heap: &Heap, id: HeapId) -> RunResult<f64> {
    match heap.get(id) {
        HeapData::Char(c) => Ok(f64::from(*c)),
        HeapData::Int(i) => Ok(*i as f64),
        HeapData::Float(f) => Ok(*f),
        other => Err(RunError::value_error(format!("cannot convert {} to float", other.kind()))),
    }
}

fn as_bool_id(heap: &Heap, id: HeapId) -> RunResult<bool> {
    match heap.get(id) {
        HeapData::Char(c) => Ok(*c != 0),
        HeapData::Int(i) => Ok(*i != 0),
        HeapData::Float(f) => Ok(*f != 0.0),
        other => Err(RunError::value_error(format!("cannot convert {} to bool", other.kind()))),
    }
}

pub(crate) fn as_char(heap: &Heap, v: &Value) -> RunResult<u8> {
    as_char_id(heap, resolve_id(heap, v))
}

pub(crate) fn as_int(heap: &Heap, v: &Value) -> RunResult<i64> {
    as_int_id(heap, resolve_id(heap, v))
}

pub(crate) fn as_float(heap: &Heap, v: &Value) -> RunResult<f64> {
    as_float_id(heap, resolve_id(heap, v))
}

pub(crate) fn as_bool(heap: &Heap, v: &Value) -> RunResult<bool> {
    as_bool_id(heap, resolve_id(heap, v))
}

/// Text form of a value: strings verbatim, chars as one character, numbers
/// in their printed form, `"none"`, and the empty string for positions.
pub(crate) fn as_str(heap: &Heap, v: &Value) -> String {
    text_for_concat(heap, resolve_id(heap, v))
}

/// Text form used by the `print` statement.
pub(crate) fn display(heap: &Heap, v: &Value) -> String {
    display_id(heap, v.id())
}

fn display_id(heap: &Heap, id: HeapId) -> String {
    match heap.get(id) {
        HeapData::Char(c) => (*c as char).to_string(),
        HeapData::Int(i) => i.to_string(),
        HeapData::Float(f) => format_float(*f),
        HeapData::Str(s) => s.clone(),
        HeapData::List(list) => {
            let mut out = String::from("[");
            for (i, node) in list.nodes.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&display_id(heap, listnode_inner(heap, *node)));
            }
            out.push(']');
            out
        }
        HeapData::ListNode(node) => display_id(heap, node.value.id()),
        HeapData::Position(_) => String::new(),
        HeapData::None => "none".to_owned(),
    }
}

/// Text form a value takes when concatenated to a string.
fn text_for_concat(heap: &Heap, id: HeapId) -> String {
    match heap.get(id) {
        HeapData::Char(c) => (*c as char).to_string(),
        HeapData::Int(i) => i.to_string(),
        HeapData::Float(f) => format_float(*f),
        HeapData::Str(s) => s.clone(),
        HeapData::ListNode(node) => text_for_concat(heap, node.value.id()),
        HeapData::None => "none".to_owned(),
        _ => String::new(),
    }
}

/// Formats a float with up to 15 significant digits, choosing between
/// fixed and scientific notation and stripping trailing zeros, like
/// `printf("%.15G", ...)`.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NAN".to_owned();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-INF" } else { "INF" }.to_owned();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }
    let scientific = format!("{value:.14e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= 15 {
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}E{sign}{:02}", exponent.abs())
    } else {
        let precision = (14 - exponent).max(0) as usize;
        let fixed = format!("{value:.precision$}");
        if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            fixed
        }
    }
}

/// Decodes one line of `input` into a char, understanding a typed escape
/// sequence such as a backslash followed by `n`.
pub(crate) fn char_from_input(line: &str) -> RunResult<u8> {
    let bytes = line.as_bytes();
    if bytes.first() == Some(&b'\\') {
        match bytes.get(1) {
            Some(&c) => decode_escape(c)
                .ok_or_else(|| RunError::value_error(format!("unknown escape sequence: {}", c as char))),
            None => Err(RunError::value_error("unknown escape sequence")),
        }
    } else {
        Ok(bytes.first().copied().unwrap_or(0))
    }
}

/// Converts one line of `input` to the kind of the target identifier.
pub(crate) fn scan_input(heap: &mut Heap, kind: ValueKind, line: &str) -> RunResult<Value> {
    match kind {
        ValueKind::Char => {
            let c = char_from_input(line)?;
            heap.allocate(HeapData::Char(c))
        }
        ValueKind::Int => {
            let i: i64 = line
                .parse()
                .map_err(|_| RunError::value_error(format!("cannot convert {line} to int")))?;
            heap.allocate(HeapData::Int(i))
        }
        ValueKind::Float => {
            let f: f64 = line
                .parse()
                .map_err(|_| RunError::value_error(format!("cannot convert {line} to float")))?;
            heap.allocate(HeapData::Float(f))
        }
        ValueKind::Str => heap.allocate(HeapData::Str(line.to_owned())),
        other => Err(RunError::type_error(format!("unsupported type for input: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn int(heap: &mut Heap, i: i64) -> Value {
        heap.allocate(HeapData::Int(i)).unwrap()
    }

    fn float(heap: &mut Heap, f: f64) -> Value {
        heap.allocate(HeapData::Float(f)).unwrap()
    }

    #[test]
    fn arithmetic_coerces_float_over_int_over_char() {
        let mut heap = Heap::new(None, 0);
        let a = int(&mut heap, 1);
        let b = float(&mut heap, 2.0);
        let r = binary(&mut heap, BinOp::Add, &a, &b).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Float(f) if *f == 3.0));
        r.release(&mut heap);

        let c = heap.allocate(HeapData::Char(b'a')).unwrap();
        let r = binary(&mut heap, BinOp::Add, &c, &a).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Int(98)));
        r.release(&mut heap);

        let d = heap.allocate(HeapData::Char(1)).unwrap();
        let r = binary(&mut heap, BinOp::Add, &c, &d).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Char(98)));
        r.release(&mut heap);

        a.release(&mut heap);
        b.release(&mut heap);
        c.release(&mut heap);
        d.release(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn division_by_zero_after_integer_coercion() {
        let mut heap = Heap::new(None, 0);
        let a = float(&mut heap, 1.0);
        let b = float(&mut heap, 0.5);
        // 0.5 truncates to 0, so even a float division raises
        let err = binary(&mut heap, BinOp::Div, &a, &b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivisionByZeroError);
        a.release(&mut heap);
        b.release(&mut heap);
    }

    #[test]
    fn modulo_on_float_is_not_allowed() {
        let mut heap = Heap::new(None, 0);
        let a = float(&mut heap, 1.5);
        let b = int(&mut heap, 2);
        let err = binary(&mut heap, BinOp::Mod, &a, &b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ModNotAllowedError);
        a.release(&mut heap);
        b.release(&mut heap);
    }

    #[test]
    fn string_concat_converts_the_other_operand() {
        let mut heap = Heap::new(None, 0);
        let s = heap.allocate(HeapData::Str("v=".to_owned())).unwrap();
        let n = float(&mut heap, 1.5);
        let r = binary(&mut heap, BinOp::Add, &s, &n).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Str(t) if t == "v=1.5"));
        r.release(&mut heap);
        s.release(&mut heap);
        n.release(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn repeat_clamps_negative_counts() {
        let mut heap = Heap::new(None, 0);
        let s = heap.allocate(HeapData::Str("ab".to_owned())).unwrap();
        let n = int(&mut heap, -3);
        let r = binary(&mut heap, BinOp::Mul, &s, &n).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Str(t) if t.is_empty()));
        r.release(&mut heap);
        s.release(&mut heap);
        n.release(&mut heap);
    }

    #[test]
    fn deep_copy_of_a_list_is_independent() {
        let mut heap = Heap::new(None, 0);
        let list = heap.allocate(HeapData::List(List::default())).unwrap();
        let one = int(&mut heap, 1);
        list_append(&mut heap, list.id(), one).unwrap();

        let copy = deep_copy(&mut heap, &list).unwrap();
        // overwrite the copy's first cell
        let handle = item(&mut heap, &copy, 0).unwrap();
        let nine = int(&mut heap, 9);
        assign(&mut heap, &handle, &nine).unwrap();
        nine.release(&mut heap);
        handle.release(&mut heap);

        assert_eq!(display(&heap, &list), "[1]");
        assert_eq!(display(&heap, &copy), "[9]");
        list.release(&mut heap);
        copy.release(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn item_of_a_list_writes_through() {
        let mut heap = Heap::new(None, 0);
        let list = heap.allocate(HeapData::List(List::default())).unwrap();
        for i in 1..=3 {
            let v = int(&mut heap, i);
            list_append(&mut heap, list.id(), v).unwrap();
        }
        let handle = item(&mut heap, &list, 1).unwrap();
        let twenty = int(&mut heap, 20);
        assign(&mut heap, &handle, &twenty).unwrap();
        twenty.release(&mut heap);
        handle.release(&mut heap);
        assert_eq!(display(&heap, &list), "[1,20,3]");
        list.release(&mut heap);
        assert_eq!(heap.live_values(), 0);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let mut heap = Heap::new(None, 0);
        let s = heap.allocate(HeapData::Str("hello".to_owned())).unwrap();
        let last = item(&mut heap, &s, -1).unwrap();
        assert!(matches!(heap.get(last.id()), HeapData::Char(b'o')));
        last.release(&mut heap);
        let err = item(&mut heap, &s, 5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexError);
        let piece = slice(&mut heap, &s, -3, -1).unwrap();
        assert!(matches!(heap.get(piece.id()), HeapData::Str(t) if t == "ll"));
        piece.release(&mut heap);
        s.release(&mut heap);
    }

    #[test]
    fn list_equality_is_structural() {
        let mut heap = Heap::new(None, 0);
        let a = heap.allocate(HeapData::List(List::default())).unwrap();
        let b = heap.allocate(HeapData::List(List::default())).unwrap();
        for i in [1, 2] {
            let v = int(&mut heap, i);
            list_append(&mut heap, a.id(), v).unwrap();
            let v = int(&mut heap, i);
            list_append(&mut heap, b.id(), v).unwrap();
        }
        let r = binary(&mut heap, BinOp::Eq, &a, &b).unwrap();
        assert!(matches!(heap.get(r.id()), HeapData::Int(1)));
        r.release(&mut heap);
        a.release(&mut heap);
        b.release(&mut heap);
    }

    #[test]
    fn format_float_matches_15_significant_digits() {
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1e20), "1E+20");
        assert_eq!(format_float(1.5e-7), "1.5E-07");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(1234567890.123), "1234567890.123");
        assert_eq!(format_float(f64::INFINITY), "INF");
    }

    #[test]
    fn input_conversion_follows_the_target_kind() {
        let mut heap = Heap::new(None, 0);
        let v = scan_input(&mut heap, ValueKind::Int, "42").unwrap();
        assert!(matches!(heap.get(v.id()), HeapData::Int(42)));
        v.release(&mut heap);
        let v = scan_input(&mut heap, ValueKind::Char, "\\n").unwrap();
        assert!(matches!(heap.get(v.id()), HeapData::Char(b'\n')));
        v.release(&mut heap);
        let err = scan_input(&mut heap, ValueKind::Int, "abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueError);
        let err = scan_input(&mut heap, ValueKind::List, "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }
}
