use std::rc::Rc;

mod types;
mod value;

pub use types::*;
pub use value::*;

/// A decoded module. Produced exclusively by the decoder; consumed by
/// `Instance::instantiate`, which takes ownership so function bodies can be
/// executed without copying for the lifetime of the instance.
#[derive(Default, Debug)]
pub struct Module {
    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
    pub start: Option<u32>,
}

#[derive(Debug)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

#[derive(Debug)]
pub enum ImportDesc {
    Func { type_index: u32 },
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

/// A function body. `locals` excludes parameters; `body` is the raw bytecode
/// including the terminating `end`. The body is reference-counted so the
/// executor can walk it while mutating its own state.
#[derive(Debug)]
pub struct Function {
    pub type_index: u32,
    pub locals: Vec<ValueType>,
    pub body: Rc<[u8]>,
}

#[derive(Debug)]
pub struct Global {
    pub ty: GlobalType,
    pub init_expr: Vec<u8>,
}

#[derive(Debug)]
pub struct ElementSegment {
    pub table_index: u32,
    pub offset_expr: Vec<u8>,
    pub func_indices: Vec<u32>,
}

#[derive(Debug)]
pub struct DataSegment {
    pub memory_index: u32,
    pub offset_expr: Vec<u8>,
    pub bytes: Vec<u8>,
}

impl Module {
    /// The signature of the function at `func_index` in the combined index
    /// space (imports first, then local functions).
    pub fn func_type(&self, func_index: u32) -> Option<&FuncType> {
        let import_count = self.imported_function_count();
        let type_index = if func_index < import_count {
            let mut funcs = self.imports.iter().filter_map(|i| match i.desc {
                ImportDesc::Func { type_index } => Some(type_index),
                _ => None,
            });
            funcs.nth(func_index as usize)?
        } else {
            let local = (func_index - import_count) as usize;
            self.functions.get(local)?.type_index
        };
        self.types.get(type_index as usize)
    }

    pub fn find_export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn imported_function_count(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, ImportDesc::Func { .. }))
            .count() as u32
    }

    pub fn total_function_count(&self) -> u32 {
        self.imported_function_count() + self.functions.len() as u32
    }
}
