use std::rc::Rc;

use super::{read_vec, Cursor};
use crate::core::{
    DataSegment, ElementSegment, Export, ExportDesc, FuncType, Function, Global, ImportDesc,
    Import, MemoryType, TableType,
};
use crate::error::DecodeError;

/// Cap on expanded locals per function, against run-length bombs.
const MAX_LOCALS: u64 = 50_000;

impl<'a> Cursor<'a> {
    pub fn read_type_section(&mut self) -> Result<Vec<FuncType>, DecodeError> {
        Ok(read_vec!(self, self.read_func_type()?))
    }

    pub fn read_import_section(&mut self) -> Result<Vec<Import>, DecodeError> {
        Ok(read_vec!(self, {
            let module = self.read_name()?;
            let field = self.read_name()?;
            let desc = match self.read_byte()? {
                0x00 => ImportDesc::Func {
                    type_index: self.read_var_u32()?,
                },
                0x01 => ImportDesc::Table(self.read_table_type()?),
                0x02 => ImportDesc::Memory(self.read_memory_type()?),
                0x03 => ImportDesc::Global(self.read_global_type()?),
                kind => return Err(self.error(format!("invalid import kind: {kind:#04x}"))),
            };
            Import {
                module,
                field,
                desc,
            }
        }))
    }

    pub fn read_function_section(&mut self) -> Result<Vec<u32>, DecodeError> {
        Ok(read_vec!(self, self.read_var_u32()?))
    }

    pub fn read_table_section(&mut self) -> Result<Vec<TableType>, DecodeError> {
        Ok(read_vec!(self, self.read_table_type()?))
    }

    pub fn read_memory_section(&mut self) -> Result<Vec<MemoryType>, DecodeError> {
        Ok(read_vec!(self, self.read_memory_type()?))
    }

    pub fn read_global_section(&mut self) -> Result<Vec<Global>, DecodeError> {
        Ok(read_vec!(self, {
            Global {
                ty: self.read_global_type()?,
                init_expr: self.read_init_expr()?,
            }
        }))
    }

    pub fn read_export_section(&mut self) -> Result<Vec<Export>, DecodeError> {
        Ok(read_vec!(self, {
            let name = self.read_name()?;
            let kind = self.read_byte()?;
            let index = self.read_var_u32()?;
            let desc = match kind {
                0x00 => ExportDesc::Func(index),
                0x01 => ExportDesc::Table(index),
                0x02 => ExportDesc::Memory(index),
                0x03 => ExportDesc::Global(index),
                _ => return Err(self.error(format!("invalid export kind: {kind:#04x}"))),
            };
            Export { name, desc }
        }))
    }

    pub fn read_element_section(&mut self) -> Result<Vec<ElementSegment>, DecodeError> {
        Ok(read_vec!(self, {
            ElementSegment {
                table_index: self.read_var_u32()?,
                offset_expr: self.read_init_expr()?,
                func_indices: read_vec!(self, self.read_var_u32()?),
            }
        }))
    }

    /// The code section pairs element-wise with the function section; the
    /// counts must match.
    pub fn read_code_section(
        &mut self,
        function_types: &[u32],
    ) -> Result<Vec<Function>, DecodeError> {
        let count = self.read_var_u32()?;
        if count as usize != function_types.len() {
            return Err(self.error(format!(
                "code section count ({count}) does not match function section count ({})",
                function_types.len()
            )));
        }

        let mut functions = Vec::with_capacity(function_types.len());
        for &type_index in function_types {
            let body_size = self.read_var_u32()? as usize;
            if body_size > self.remaining() {
                return Err(self.error("function body extends past end of section"));
            }
            let body_end = self.position() + body_size;

            // Locals use a run-length encoding of (count, type) pairs.
            let mut locals = Vec::new();
            let decl_count = self.read_var_u32()?;
            for _ in 0..decl_count {
                let run = self.read_var_u32()?;
                let ty = self.read_value_type()?;
                if locals.len() as u64 + u64::from(run) > MAX_LOCALS {
                    return Err(self.error("function declares too many locals"));
                }
                locals.extend(std::iter::repeat(ty).take(run as usize));
            }

            if self.position() > body_end {
                return Err(self.error("function locals extend past the declared body size"));
            }
            let body = self.read_bytes(body_end - self.position())?;
            functions.push(Function {
                type_index,
                locals,
                body: Rc::from(body),
            });
        }
        Ok(functions)
    }

    pub fn read_data_section(&mut self) -> Result<Vec<DataSegment>, DecodeError> {
        Ok(read_vec!(self, {
            let memory_index = self.read_var_u32()?;
            let offset_expr = self.read_init_expr()?;
            let len = self.read_var_u32()? as usize;
            let bytes = self.read_bytes(len)?.to_vec();
            DataSegment {
                memory_index,
                offset_expr,
                bytes,
            }
        }))
    }
}
