use std::rc::Rc;

use tracing::{debug, trace};

mod const_expr;
mod frame;
mod host;
mod memory;
mod numeric;
mod stack;

pub use memory::{Memory, MAX_PAGES, PAGE_SIZE};
pub use stack::Stack;

use frame::{Frame, Label};

use crate::core::{ExportDesc, ImportDesc, Module, Value, ValueType};
use crate::error::{RuntimeError, Trap};

/// Hard bound on call nesting; exceeding it traps.
const MAX_CALL_DEPTH: usize = 1024;

const WASI_MODULE: &str = "wasi_snapshot_preview1";

/// An instantiated module: the module itself, its linear memory, its globals,
/// and the transient execution state. A fresh instance is fully independent;
/// nothing is shared between instances.
#[derive(Debug)]
pub struct Instance {
    module: Module,
    memory: Option<Memory>,
    globals: Vec<Value>,
    stack: Stack,
    depth: usize,
}

impl Instance {
    /// Takes ownership of a decoded module, builds its memory, evaluates its
    /// global initializers, applies data segments, and runs the start
    /// function if one is declared.
    pub fn instantiate(module: Module) -> Result<Instance, RuntimeError> {
        let memory = match module.memories.first() {
            Some(ty) => Some(Memory::new(&ty.limits)?),
            None => None,
        };
        let mut instance = Instance {
            module,
            memory,
            globals: Vec::new(),
            stack: Stack::default(),
            depth: 0,
        };
        instance.initialize_globals()?;
        instance.initialize_data()?;
        debug!(
            functions = instance.module.functions.len(),
            globals = instance.globals.len(),
            memory_pages = instance.memory.as_ref().map(Memory::size),
            "module instantiated"
        );
        if let Some(start) = instance.module.start {
            trace!(start, "running start function");
            instance.invoke(start)?;
        }
        Ok(instance)
    }

    /// Calls an exported function. Arguments are consumed; the declared
    /// results are returned in order.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        let export = self
            .module
            .find_export(name)
            .ok_or_else(|| RuntimeError::interpreter(format!("export not found: {name}")))?;
        let ExportDesc::Func(index) = export.desc else {
            return Err(RuntimeError::interpreter(format!(
                "export is not a function: {name}"
            )));
        };
        debug!(name, index, "calling export");
        self.call_function(index, args)
    }

    /// Calls a function by index in the combined function index space.
    pub fn call_function(
        &mut self,
        func_index: u32,
        args: &[Value],
    ) -> Result<Vec<Value>, RuntimeError> {
        if func_index >= self.module.total_function_count() {
            return Err(RuntimeError::interpreter(format!(
                "invalid function index: {func_index}"
            )));
        }
        for arg in args {
            self.stack.push(*arg);
        }
        self.invoke(func_index)?;

        let result_count = self
            .module
            .func_type(func_index)
            .map(|ty| ty.results.len())
            .unwrap_or(0);
        let mut results = Vec::with_capacity(result_count);
        for _ in 0..result_count {
            results.push(self.stack.pop()?);
        }
        results.reverse();
        Ok(results)
    }

    fn initialize_globals(&mut self) -> Result<(), RuntimeError> {
        for i in 0..self.module.globals.len() {
            let value = const_expr::eval(&self.module.globals[i].init_expr, &self.globals)?;
            let declared = self.module.globals[i].ty.value_type;
            if value.ty() != declared {
                return Err(RuntimeError::interpreter(format!(
                    "global {i} initializer has type {}, declared {declared}",
                    value.ty()
                )));
            }
            self.globals.push(value);
        }
        Ok(())
    }

    fn initialize_data(&mut self) -> Result<(), RuntimeError> {
        for segment in &self.module.data {
            let memory = self
                .memory
                .as_mut()
                .ok_or_else(|| RuntimeError::interpreter("data segment without a memory"))?;
            let offset = match const_expr::eval(&segment.offset_expr, &self.globals)? {
                Value::I32(v) => v as u32,
                other => {
                    return Err(RuntimeError::interpreter(format!(
                        "data segment offset must be i32, got {}",
                        other.ty()
                    )))
                }
            };
            memory.initialize(offset, &segment.bytes)?;
        }
        Ok(())
    }

    /// Invokes the function at `func_index`: imports route to the host-call
    /// bridge; local functions get a fresh frame whose parameter slots are
    /// popped from the operand stack right-to-left.
    fn invoke(&mut self, func_index: u32) -> Result<(), RuntimeError> {
        let import_count = self.module.imported_function_count();
        if func_index < import_count {
            return self.invoke_import(func_index);
        }

        let local_index = (func_index - import_count) as usize;
        let function = self.module.functions.get(local_index).ok_or_else(|| {
            RuntimeError::interpreter(format!("invalid function index: {func_index}"))
        })?;
        let param_count = self
            .module
            .func_type(func_index)
            .ok_or_else(|| {
                RuntimeError::interpreter(format!(
                    "invalid type index for function {func_index}"
                ))
            })?
            .params
            .len();

        let mut locals = vec![Value::I32(0); param_count + function.locals.len()];
        for (slot, ty) in locals[param_count..].iter_mut().zip(&function.locals) {
            *slot = Value::zero(*ty)
                .ok_or_else(|| RuntimeError::interpreter("local declared with type void"))?;
        }
        let body = Rc::clone(&function.body);
        for slot in locals[..param_count].iter_mut().rev() {
            *slot = self.stack.pop()?;
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(Trap::CallStackExhausted.into());
        }
        self.depth += 1;
        let mut frame = Frame::new(body, locals);
        let result = self.run(&mut frame);
        self.depth -= 1;
        result
    }

    fn invoke_import(&mut self, func_index: u32) -> Result<(), RuntimeError> {
        let import = self
            .module
            .imports
            .iter()
            .filter(|i| matches!(i.desc, ImportDesc::Func { .. }))
            .nth(func_index as usize)
            .ok_or_else(|| {
                RuntimeError::interpreter(format!("invalid import index: {func_index}"))
            })?;

        if import.module == WASI_MODULE && import.field == "fd_write" {
            let memory = self
                .memory
                .as_mut()
                .ok_or_else(|| RuntimeError::interpreter("no memory instantiated for fd_write"))?;
            host::fd_write(memory, &mut self.stack)
        } else {
            Err(Trap::UnresolvedImport {
                module: import.module.clone(),
                field: import.field.clone(),
            }
            .into())
        }
    }

    fn run(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        while !frame.finished() {
            self.step(frame)?;
        }
        Ok(())
    }

    fn step(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let opcode = frame.read_byte()?;
        match opcode {
            0x00..=0x11 => self.control(frame, opcode),
            0x1a | 0x1b => self.parametric(opcode),
            0x20..=0x24 => self.variable(frame, opcode),
            0x28..=0x40 => self.memory_op(frame, opcode),
            0x41..=0x44 => self.constant(frame, opcode),
            0x45..=0xa6 => numeric::numeric(&mut self.stack, opcode),
            0xa7..=0xbf => numeric::conversion(&mut self.stack, opcode),
            0xfc => {
                let sub_opcode = frame.read_var_u32()?;
                numeric::saturating_truncation(&mut self.stack, sub_opcode)
            }
            _ => Err(RuntimeError::interpreter(format!(
                "unknown opcode {opcode:#04x}"
            ))),
        }
    }

    fn control(&mut self, frame: &mut Frame, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            0x00 => return Err(Trap::Unreachable.into()),
            0x01 => {} // nop
            0x02 => {
                // block: branches jump past the matching end
                let arity = block_arity(frame.read_byte()?)?;
                let target_pc = frame.find_matching_end()?;
                frame.labels.push(Label {
                    target_pc,
                    stack_height: self.stack.len(),
                    is_loop: false,
                    arity,
                });
            }
            0x03 => {
                // loop: branches jump back to the body start, carrying nothing
                frame.read_byte()?;
                frame.labels.push(Label {
                    target_pc: frame.pc,
                    stack_height: self.stack.len(),
                    is_loop: true,
                    arity: 0,
                });
            }
            0x04 => {
                let arity = block_arity(frame.read_byte()?)?;
                let condition = self.stack.pop_i32()?;
                let stack_height = self.stack.len();
                let (else_pc, end_pc) = frame.find_else_and_end()?;
                frame.labels.push(Label {
                    target_pc: end_pc,
                    stack_height,
                    is_loop: false,
                    arity,
                });
                if condition == 0 {
                    match else_pc {
                        Some(pc) => frame.pc = pc,
                        None => {
                            // no else arm: skip past end, whose label pop
                            // will never run
                            frame.pc = end_pc;
                            frame.labels.pop();
                        }
                    }
                }
            }
            0x05 => {
                // else reached by falling out of the then arm: skip to end
                let label = frame
                    .labels
                    .pop()
                    .ok_or_else(|| RuntimeError::interpreter("else without matching if"))?;
                frame.pc = label.target_pc;
            }
            0x0b => {
                // end of a block, or of the function body once labels are gone
                frame.labels.pop();
            }
            0x0c => {
                let depth = frame.read_var_u32()?;
                self.branch(frame, depth)?;
            }
            0x0d => {
                let depth = frame.read_var_u32()?;
                if self.stack.pop_i32()? != 0 {
                    self.branch(frame, depth)?;
                }
            }
            0x0e => {
                let count = frame.read_var_u32()?;
                let mut targets = Vec::with_capacity(count.min(1024) as usize);
                for _ in 0..count {
                    targets.push(frame.read_var_u32()?);
                }
                let default = frame.read_var_u32()?;
                let index = self.stack.pop_i32()?;
                let depth = if index >= 0 && (index as u32) < count {
                    targets[index as usize]
                } else {
                    default
                };
                self.branch(frame, depth)?;
            }
            0x0f => {
                // return: unwind all labels and fall off the body
                frame.labels.clear();
                frame.pc = frame.code.len();
            }
            0x10 => {
                let func_index = frame.read_var_u32()?;
                self.invoke(func_index)?;
            }
            0x11 => self.call_indirect(frame)?,
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unknown opcode {opcode:#04x}"
                )))
            }
        }
        Ok(())
    }

    /// Branches to the label at `depth` (0 = innermost): jump to its target,
    /// preserve the top `arity` values while truncating the stack to the
    /// label's recorded height, and pop labels above the target (the target
    /// itself stays only for loops).
    fn branch(&mut self, frame: &mut Frame, depth: u32) -> Result<(), RuntimeError> {
        let depth = depth as usize;
        if depth >= frame.labels.len() {
            return Err(RuntimeError::interpreter(format!(
                "branch depth {depth} out of range"
            )));
        }
        let index = frame.labels.len() - 1 - depth;
        let Label {
            target_pc,
            stack_height,
            is_loop,
            arity,
        } = frame.labels[index];

        frame.pc = target_pc;

        let mut preserved = Vec::with_capacity(arity);
        for _ in 0..arity {
            preserved.push(self.stack.pop()?);
        }
        self.stack.truncate(stack_height);
        for value in preserved.into_iter().rev() {
            self.stack.push(value);
        }

        frame.labels.truncate(if is_loop { index + 1 } else { index });
        Ok(())
    }

    fn call_indirect(&mut self, frame: &mut Frame) -> Result<(), RuntimeError> {
        let type_index = frame.read_var_u32()?;
        let reserved = frame.read_byte()?;
        if reserved != 0x00 {
            return Err(RuntimeError::interpreter(format!(
                "invalid table index {reserved:#04x} in call_indirect"
            )));
        }

        let elem_index = self.stack.pop_i32()?;
        if elem_index < 0 {
            return Err(Trap::UndefinedElement.into());
        }
        let func_index = self.resolve_table_entry(elem_index as u32)?;

        let expected = self
            .module
            .types
            .get(type_index as usize)
            .ok_or(Trap::SignatureMismatch)?;
        let actual = self
            .module
            .func_type(func_index)
            .ok_or(Trap::SignatureMismatch)?;
        if actual != expected {
            return Err(Trap::SignatureMismatch.into());
        }
        self.invoke(func_index)
    }

    /// Maps a table slot to a function index by searching the element
    /// segments for table 0. First match wins.
    fn resolve_table_entry(&self, elem_index: u32) -> Result<u32, RuntimeError> {
        for segment in &self.module.elements {
            if segment.table_index != 0 {
                continue;
            }
            let offset = match const_expr::eval(&segment.offset_expr, &self.globals)? {
                Value::I32(v) => v as u32,
                other => {
                    return Err(RuntimeError::interpreter(format!(
                        "element segment offset must be i32, got {}",
                        other.ty()
                    )))
                }
            };
            let Some(relative) = elem_index.checked_sub(offset) else {
                continue;
            };
            if let Some(&func_index) = segment.func_indices.get(relative as usize) {
                return Ok(func_index);
            }
        }
        Err(Trap::UndefinedElement.into())
    }

    fn parametric(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            0x1a => {
                self.stack.pop()?;
            }
            0x1b => {
                let condition = self.stack.pop_i32()?;
                let v2 = self.stack.pop()?;
                let v1 = self.stack.pop()?;
                self.stack.push(if condition != 0 { v1 } else { v2 });
            }
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unknown opcode {opcode:#04x}"
                )))
            }
        }
        Ok(())
    }

    fn variable(&mut self, frame: &mut Frame, opcode: u8) -> Result<(), RuntimeError> {
        let index = frame.read_var_u32()? as usize;
        match opcode {
            0x20 => {
                let value = *frame.locals.get(index).ok_or_else(|| local_oob(index))?;
                self.stack.push(value);
            }
            0x21 => {
                let value = self.stack.pop()?;
                *frame.locals.get_mut(index).ok_or_else(|| local_oob(index))? = value;
            }
            0x22 => {
                let value = self.stack.peek()?;
                *frame.locals.get_mut(index).ok_or_else(|| local_oob(index))? = value;
            }
            0x23 => {
                let value = *self.globals.get(index).ok_or_else(|| global_oob(index))?;
                self.stack.push(value);
            }
            0x24 => {
                let value = self.stack.pop()?;
                let global = self
                    .module
                    .globals
                    .get(index)
                    .ok_or_else(|| global_oob(index))?;
                if !global.ty.mutable {
                    return Err(Trap::ImmutableGlobal.into());
                }
                self.globals[index] = value;
            }
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unknown opcode {opcode:#04x}"
                )))
            }
        }
        Ok(())
    }

    fn memory_op(&mut self, frame: &mut Frame, opcode: u8) -> Result<(), RuntimeError> {
        let memory = self
            .memory
            .as_mut()
            .ok_or_else(|| RuntimeError::interpreter("no memory instantiated"))?;

        // memory.size and memory.grow carry a reserved byte, not a memarg
        if opcode == 0x3f {
            frame.read_byte()?;
            let pages = memory.size() as i32;
            self.stack.push_i32(pages);
            return Ok(());
        }
        if opcode == 0x40 {
            frame.read_byte()?;
            let delta = self.stack.pop_i32()?;
            let previous = memory.grow(delta as u32);
            self.stack.push_i32(previous);
            return Ok(());
        }

        let _align = frame.read_var_u32()?; // advisory
        let offset = frame.read_var_u32()?;

        match opcode {
            // loads
            0x28 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i32(addr)?;
                self.stack.push_i32(v);
            }
            0x29 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i64(addr)?;
                self.stack.push_i64(v);
            }
            0x2a => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_f32(addr)?;
                self.stack.push_f32(v);
            }
            0x2b => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_f64(addr)?;
                self.stack.push_f64(v);
            }
            0x2c => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i8(addr)?;
                self.stack.push_i32(v as i32);
            }
            0x2d => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_u8(addr)?;
                self.stack.push_i32(v as i32);
            }
            0x2e => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i16(addr)?;
                self.stack.push_i32(v as i32);
            }
            0x2f => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_u16(addr)?;
                self.stack.push_i32(v as i32);
            }
            0x30 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i8(addr)?;
                self.stack.push_i64(v as i64);
            }
            0x31 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_u8(addr)?;
                self.stack.push_i64(v as i64);
            }
            0x32 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i16(addr)?;
                self.stack.push_i64(v as i64);
            }
            0x33 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_u16(addr)?;
                self.stack.push_i64(v as i64);
            }
            0x34 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_i32(addr)?;
                self.stack.push_i64(v as i64);
            }
            0x35 => {
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                let v = memory.load_u32(addr)?;
                self.stack.push_i64(v as i64);
            }

            // stores pop the value first, then the base address
            0x36 => {
                let value = self.stack.pop_i32()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_i32(addr, value)?;
            }
            0x37 => {
                let value = self.stack.pop_i64()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_i64(addr, value)?;
            }
            0x38 => {
                let value = self.stack.pop_f32()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_f32(addr, value)?;
            }
            0x39 => {
                let value = self.stack.pop_f64()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_f64(addr, value)?;
            }
            0x3a => {
                let value = self.stack.pop_i32()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_u8(addr, value as u8)?;
            }
            0x3b => {
                let value = self.stack.pop_i32()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_u16(addr, value as u16)?;
            }
            0x3c => {
                let value = self.stack.pop_i64()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_u8(addr, value as u8)?;
            }
            0x3d => {
                let value = self.stack.pop_i64()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_u16(addr, value as u16)?;
            }
            0x3e => {
                let value = self.stack.pop_i64()?;
                let addr = effective_address(self.stack.pop_i32()?, offset)?;
                memory.store_u32(addr, value as u32)?;
            }
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unknown opcode {opcode:#04x}"
                )))
            }
        }
        Ok(())
    }

    fn constant(&mut self, frame: &mut Frame, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            0x41 => {
                let v = frame.read_var_i32()?;
                self.stack.push_i32(v);
            }
            0x42 => {
                let v = frame.read_var_i64()?;
                self.stack.push_i64(v);
            }
            0x43 => {
                let v = frame.read_f32()?;
                self.stack.push_f32(v);
            }
            0x44 => {
                let v = frame.read_f64()?;
                self.stack.push_f64(v);
            }
            _ => {
                return Err(RuntimeError::interpreter(format!(
                    "unknown opcode {opcode:#04x}"
                )))
            }
        }
        Ok(())
    }
}

fn local_oob(index: usize) -> RuntimeError {
    RuntimeError::interpreter(format!("local index {index} out of range"))
}

fn global_oob(index: usize) -> RuntimeError {
    RuntimeError::interpreter(format!("global index {index} out of range"))
}

/// Block-type byte of block/loop/if: 0x40 means no result, a value type
/// means one result.
fn block_arity(block_type: u8) -> Result<usize, RuntimeError> {
    match ValueType::from_byte(block_type) {
        Some(ValueType::Void) => Ok(0),
        Some(_) => Ok(1),
        None => Err(RuntimeError::interpreter(format!(
            "invalid block type: {block_type:#04x}"
        ))),
    }
}

/// Effective address of a memory access, computed in 64 bits so the
/// base + offset sum cannot wrap within the 32-bit address space.
fn effective_address(base: i32, offset: u32) -> Result<u32, Trap> {
    let addr = base as u32 as u64 + offset as u64;
    u32::try_from(addr).map_err(|_| Trap::AddressOverflow)
}
