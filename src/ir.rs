//! Abstract IR-builder contract and a textual LLVM-IR realization of
//! it.
//!
//! Generating LLVM IR as text and shelling out to `clang` is simpler and
//! more portable than binding against LLVM's C++ API through FFI; the
//! lowering pass itself only ever talks to the `IrBuilder` trait, so a
//! different backend (a real IR-builder library, a different target) can be
//! swapped in without touching `lowering.rs`.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::types::Type;

pub type FuncId = usize;
pub type BlockId = (FuncId, usize);
/// An LLVM operand: an SSA register name (`"%7"`), a constant
/// (`"42"`/`"1.5"`), or a global (`"@fact.anx"`).
pub type IrRef = String;

fn llvm_type(ty: Type) -> &'static str {
    match ty {
        Type::Void => "void",
        Type::Bool => "i1",
        Type::I8 | Type::U8 => "i8",
        Type::I16 | Type::U16 => "i16",
        Type::I32 | Type::U32 => "i32",
        Type::I64 | Type::U64 => "i64",
        Type::I128 | Type::U128 => "i128",
        Type::F32 => "float",
        Type::F64 => "double",
    }
}

/// Error type for code generation operations: formatting into the IR text
/// buffer cannot realistically fail, but `Write` demands a `Result`, and
/// keeping the error type narrow (rather than `anyhow`-style boxing) keeps
/// call sites honest about what can actually go wrong here.
#[derive(Debug)]
pub enum CodeGenError {
    Format(std::fmt::Error),
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::Format(e) => write!(f, "IR generation error: {e}"),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

/// Everything the lowering pass needs from an IR backend. The core never
/// reaches for LLVM-specific types directly -- it only calls through here.
pub trait IrBuilder {
    fn new_function(&mut self, name: &str, ret: Type, params: &[Type], is_pub: bool) -> FuncId;
    fn param_value(&self, func: FuncId, index: usize) -> IrRef;
    fn append_block(&mut self, func: FuncId, label: &str) -> BlockId;
    fn set_insert_block(&mut self, block: BlockId);
    fn current_block(&self) -> BlockId;
    fn has_terminator(&self, block: BlockId) -> bool;

    fn br(&mut self, target: BlockId);
    fn cond_br(&mut self, cond: IrRef, then_blk: BlockId, else_blk: BlockId);
    fn ret(&mut self, value: Option<(Type, IrRef)>);

    fn alloca_in_entry(&mut self, func: FuncId, ty: Type) -> IrRef;
    fn load(&mut self, slot: &IrRef, ty: Type) -> IrRef;
    fn store(&mut self, slot: &IrRef, ty: Type, value: IrRef);

    fn const_int(&mut self, ty: Type, value: u128) -> IrRef;
    fn const_float(&mut self, ty: Type, value: f64) -> IrRef;

    fn binop(&mut self, op: &str, ty: Type, lhs: IrRef, rhs: IrRef) -> IrRef;
    fn cmp(&mut self, kind: &str, ty: Type, lhs: IrRef, rhs: IrRef) -> IrRef;
    fn neg(&mut self, ty: Type, val: IrRef) -> IrRef;
    fn fneg(&mut self, ty: Type, val: IrRef) -> IrRef;
    fn not(&mut self, val: IrRef) -> IrRef;

    fn cast(&mut self, kind: &str, from: Type, to: Type, val: IrRef) -> IrRef;

    fn declare_external(&mut self, name: &str, ret: Type, params: &[Type]);
    fn call(&mut self, name: &str, ret: Type, args: &[(Type, IrRef)]) -> IrRef;

    /// Remove basic blocks unreachable from the function's entry block --
    /// the closest the bundled backend comes to the external optimizer pass
    /// the IR-builder contract otherwise delegates out.
    fn sweep_dead_blocks(&mut self, func: FuncId);

    /// Render the whole module as LLVM-IR text.
    fn render(&self) -> String;
}

struct Block {
    label: String,
    instrs: Vec<String>,
    terminated: bool,
}

struct Function {
    name: String,
    ret: Type,
    params: Vec<Type>,
    is_pub: bool,
    blocks: Vec<Block>,
    /// Count of `alloca`s inserted at the front of the entry block so far;
    /// new allocas are inserted right after the previous ones regardless of
    /// the current insertion point, keeping every slot confined to the
    /// entry block (the "no alloca in a loop" rule).
    entry_alloca_count: usize,
}

pub struct LlvmTextBuilder {
    functions: Vec<Function>,
    declared_externals: HashMap<String, (Type, Vec<Type>)>,
    reg_counter: u64,
    insert: BlockId,
}

impl Default for LlvmTextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LlvmTextBuilder {
    pub fn new() -> Self {
        LlvmTextBuilder {
            functions: Vec::new(),
            declared_externals: HashMap::new(),
            reg_counter: 0,
            insert: (0, 0),
        }
    }

    fn fresh_reg(&mut self) -> String {
        let r = format!("%r{}", self.reg_counter);
        self.reg_counter += 1;
        r
    }

    fn emit(&mut self, line: String) {
        let (f, b) = self.insert;
        self.functions[f].blocks[b].instrs.push(line);
    }

    fn mark_terminated(&mut self) {
        let (f, b) = self.insert;
        self.functions[f].blocks[b].terminated = true;
    }
}

impl IrBuilder for LlvmTextBuilder {
    fn new_function(&mut self, name: &str, ret: Type, params: &[Type], is_pub: bool) -> FuncId {
        let id = self.functions.len();
        self.functions.push(Function {
            name: name.to_string(),
            ret,
            params: params.to_vec(),
            is_pub,
            blocks: Vec::new(),
            entry_alloca_count: 0,
        });
        id
    }

    fn param_value(&self, func: FuncId, index: usize) -> IrRef {
        format!("%{}.{}", self.functions[func].name, index)
    }

    fn append_block(&mut self, func: FuncId, label: &str) -> BlockId {
        let idx = self.functions[func].blocks.len();
        self.functions[func].blocks.push(Block {
            label: format!("{label}{idx}"),
            instrs: Vec::new(),
            terminated: false,
        });
        (func, idx)
    }

    fn set_insert_block(&mut self, block: BlockId) {
        self.insert = block;
    }

    fn current_block(&self) -> BlockId {
        self.insert
    }

    fn has_terminator(&self, block: BlockId) -> bool {
        self.functions[block.0].blocks[block.1].terminated
    }

    fn br(&mut self, target: BlockId) {
        let label = self.functions[target.0].blocks[target.1].label.clone();
        self.emit(format!("  br label %{label}"));
        self.mark_terminated();
    }

    fn cond_br(&mut self, cond: IrRef, then_blk: BlockId, else_blk: BlockId) {
        let then_label = self.functions[then_blk.0].blocks[then_blk.1].label.clone();
        let else_label = self.functions[else_blk.0].blocks[else_blk.1].label.clone();
        self.emit(format!(
            "  br i1 {cond}, label %{then_label}, label %{else_label}"
        ));
        self.mark_terminated();
    }

    fn ret(&mut self, value: Option<(Type, IrRef)>) {
        match value {
            Some((ty, v)) => self.emit(format!("  ret {} {v}", llvm_type(ty))),
            None => self.emit("  ret void".to_string()),
        }
        self.mark_terminated();
    }

    fn alloca_in_entry(&mut self, func: FuncId, ty: Type) -> IrRef {
        let reg = self.fresh_reg();
        let f = &mut self.functions[func];
        let at = f.entry_alloca_count;
        f.blocks[0]
            .instrs
            .insert(at, format!("  {reg} = alloca {}", llvm_type(ty)));
        f.entry_alloca_count += 1;
        reg
    }

    fn load(&mut self, slot: &IrRef, ty: Type) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!("  {reg} = load {}, ptr {slot}", llvm_type(ty)));
        reg
    }

    fn store(&mut self, slot: &IrRef, ty: Type, value: IrRef) {
        self.emit(format!("  store {} {value}, ptr {slot}", llvm_type(ty)));
    }

    fn const_int(&mut self, ty: Type, value: u128) -> IrRef {
        let _ = ty;
        value.to_string()
    }

    fn const_float(&mut self, ty: Type, value: f64) -> IrRef {
        let _ = ty;
        format!("{value:?}")
    }

    fn binop(&mut self, op: &str, ty: Type, lhs: IrRef, rhs: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!("  {reg} = {op} {} {lhs}, {rhs}", llvm_type(ty)));
        reg
    }

    fn cmp(&mut self, kind: &str, ty: Type, lhs: IrRef, rhs: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        let instr = if ty.is_float() { "fcmp" } else { "icmp" };
        self.emit(format!(
            "  {reg} = {instr} {kind} {} {lhs}, {rhs}",
            llvm_type(ty)
        ));
        reg
    }

    fn neg(&mut self, ty: Type, val: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!("  {reg} = sub {} 0, {val}", llvm_type(ty)));
        reg
    }

    fn fneg(&mut self, ty: Type, val: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!("  {reg} = fneg {} {val}", llvm_type(ty)));
        reg
    }

    fn not(&mut self, val: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!("  {reg} = xor i1 {val}, 1"));
        reg
    }

    fn cast(&mut self, kind: &str, from: Type, to: Type, val: IrRef) -> IrRef {
        let reg = self.fresh_reg();
        self.emit(format!(
            "  {reg} = {kind} {} {val} to {}",
            llvm_type(from),
            llvm_type(to)
        ));
        reg
    }

    fn declare_external(&mut self, name: &str, ret: Type, params: &[Type]) {
        self.declared_externals
            .entry(name.to_string())
            .or_insert_with(|| (ret, params.to_vec()));
    }

    fn call(&mut self, name: &str, ret: Type, args: &[(Type, IrRef)]) -> IrRef {
        let arg_list = args
            .iter()
            .map(|(ty, v)| format!("{} {v}", llvm_type(*ty)))
            .collect::<Vec<_>>()
            .join(", ");
        if ret.is_void() {
            self.emit(format!("  call void @{name}({arg_list})"));
            String::new()
        } else {
            let reg = self.fresh_reg();
            self.emit(format!(
                "  {reg} = call {} @{name}({arg_list})",
                llvm_type(ret)
            ));
            reg
        }
    }

    fn sweep_dead_blocks(&mut self, func: FuncId) {
        let f = &mut self.functions[func];
        if f.blocks.is_empty() {
            return;
        }
        let mut reachable = vec![false; f.blocks.len()];
        reachable[0] = true;
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..f.blocks.len() {
                if !reachable[i] {
                    continue;
                }
                for instr in &f.blocks[i].instrs {
                    if let Some(label) = instr.strip_prefix("  br label %") {
                        mark_reachable(f, label, &mut reachable, &mut changed);
                    } else if instr.contains("br i1") {
                        for part in instr.split("label %").skip(1) {
                            let label: String =
                                part.chars().take_while(|c| c.is_alphanumeric()).collect();
                            mark_reachable(f, &label, &mut reachable, &mut changed);
                        }
                    }
                }
            }
        }
        let mut idx = 0;
        f.blocks.retain(|_| {
            let keep = reachable[idx];
            idx += 1;
            keep
        });
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (name, (ret, params)) in &self.declared_externals {
            let params = params.iter().map(|p| llvm_type(*p)).collect::<Vec<_>>().join(", ");
            let _ = writeln!(out, "declare {} @{name}({params})", llvm_type(*ret));
        }
        for f in &self.functions {
            let params = f
                .params
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{} %{}.{}", llvm_type(*p), f.name, i))
                .collect::<Vec<_>>()
                .join(", ");
            let linkage = if f.is_pub { "" } else { "internal " };
            let _ = writeln!(
                out,
                "define {}{} @{}({}) {{",
                linkage,
                llvm_type(f.ret),
                f.name,
                params
            );
            for b in &f.blocks {
                let _ = writeln!(out, "{}:", b.label);
                for i in &b.instrs {
                    let _ = writeln!(out, "{i}");
                }
            }
            let _ = writeln!(out, "}}");
        }
        out
    }
}

fn mark_reachable(f: &Function, label: &str, reachable: &mut [bool], changed: &mut bool) {
    if let Some(idx) = f.blocks.iter().position(|b| b.label == label) {
        if !reachable[idx] {
            reachable[idx] = true;
            *changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_simple_returning_function() {
        let mut b = LlvmTextBuilder::new();
        let f = b.new_function("main", Type::I32, &[], true);
        let entry = b.append_block(f, "entry");
        b.set_insert_block(entry);
        let c = b.const_int(Type::I32, 0);
        b.ret(Some((Type::I32, c)));
        let text = b.render();
        assert!(text.contains("define i32 @main()"));
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn internal_linkage_for_non_pub_functions() {
        let mut b = LlvmTextBuilder::new();
        let f = b.new_function("helper.anx", Type::Void, &[], false);
        let entry = b.append_block(f, "entry");
        b.set_insert_block(entry);
        b.ret(None);
        assert!(b.render().contains("define internal void @helper.anx()"));
    }

    #[test]
    fn dead_block_sweep_removes_unreachable_merge() {
        let mut b = LlvmTextBuilder::new();
        let f = b.new_function("f", Type::I32, &[], true);
        let entry = b.append_block(f, "entry");
        let dead = b.append_block(f, "dead");
        b.set_insert_block(entry);
        let c = b.const_int(Type::I32, 1);
        b.ret(Some((Type::I32, c)));
        let _ = dead;
        b.sweep_dead_blocks(f);
        let text = b.render();
        assert!(!text.contains("dead"));
    }

    #[test]
    fn dead_block_sweep_is_idempotent() {
        let mut b = LlvmTextBuilder::new();
        let f = b.new_function("f", Type::I32, &[], true);
        let entry = b.append_block(f, "entry");
        let dead = b.append_block(f, "dead");
        b.set_insert_block(entry);
        let c = b.const_int(Type::I32, 1);
        b.ret(Some((Type::I32, c)));
        let _ = dead;
        b.sweep_dead_blocks(f);
        let once = b.render();
        b.sweep_dead_blocks(f);
        assert_eq!(once, b.render());
    }

    #[test]
    fn allocas_always_land_in_entry_block() {
        let mut b = LlvmTextBuilder::new();
        let f = b.new_function("f", Type::I32, &[], true);
        let entry = b.append_block(f, "entry");
        let other = b.append_block(f, "other");
        b.set_insert_block(other);
        b.alloca_in_entry(f, Type::I32);
        b.set_insert_block(entry);
        b.br(other);
        let text = b.render();
        let entry_pos = text.find("entry0:").unwrap();
        let alloca_pos = text.find("alloca i32").unwrap();
        let other_pos = text.find("other1:").unwrap();
        assert!(entry_pos < alloca_pos && alloca_pos < other_pos);
    }
}
