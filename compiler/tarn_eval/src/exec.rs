//! Tree-walking execution of compiled routines.
//!
//! Package-level values live in the shared [`Frame`]; each routine call
//! gets its own local array sized by the CFG builder. Arithmetic on `int`
//! wraps at 64 bits.

use std::sync::Arc;

use smallvec::SmallVec;
use tarn_ir::{ensure_sufficient_stack, BinaryOp, Slot, Span, UnaryOp};

use crate::code::{Builtin, Expr, ExprKind, Place, Routine, Stmt, StmtKind};
use crate::errors::{ExecError, ExecErrorKind};
use crate::frame::Frame;
use crate::print_handler::SharedPrintHandler;
use crate::Value;

/// Default limit on nested routine calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Host services available to running code.
#[derive(Clone)]
pub struct ExecEnv {
    pub print: SharedPrintHandler,
    pub max_call_depth: usize,
}

/// Run a routine without arguments against `frame`.
pub fn execute(routine: &Arc<Routine>, frame: &Frame, env: &ExecEnv) -> Result<Value, ExecError> {
    call(routine, Vec::new(), frame, env)
}

/// Run a routine with arguments against `frame`.
#[tracing::instrument(level = "debug", skip_all, fields(routine = %routine.name))]
pub fn call(
    routine: &Arc<Routine>,
    args: Vec<Value>,
    frame: &Frame,
    env: &ExecEnv,
) -> Result<Value, ExecError> {
    let mut machine = Machine {
        frame,
        env,
        depth: 0,
    };
    machine.run(routine, args, Span::DUMMY)
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

struct Machine<'a> {
    frame: &'a Frame,
    env: &'a ExecEnv,
    depth: usize,
}

/// One active routine: its code and its locals.
struct Activation<'r> {
    routine: &'r Routine,
    locals: Vec<Value>,
}

impl Activation<'_> {
    #[cold]
    fn error(&self, kind: ExecErrorKind, span: Span) -> ExecError {
        let context = &self.routine.context;
        ExecError::new(
            kind,
            &context.file_name,
            context.position(span),
            &self.routine.name,
        )
    }
}

impl Machine<'_> {
    fn run(
        &mut self,
        routine: &Arc<Routine>,
        args: Vec<Value>,
        call_span: Span,
    ) -> Result<Value, ExecError> {
        if self.depth >= self.env.max_call_depth {
            let kind = ExecErrorKind::CallDepthExceeded {
                limit: self.env.max_call_depth,
            };
            let span = if call_span == Span::DUMMY {
                routine.span
            } else {
                call_span
            };
            let context = &routine.context;
            return Err(ExecError::new(
                kind,
                &context.file_name,
                context.position(span),
                &routine.name,
            ));
        }
        let mut locals = args;
        locals.resize(routine.locals.max(routine.params), Value::Void);
        let mut activation = Activation {
            routine: routine.as_ref(),
            locals,
        };

        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.block(&mut activation, &routine.body));
        self.depth -= 1;
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Void),
        }
    }

    fn block(&mut self, act: &mut Activation<'_>, stmts: &[Stmt]) -> Result<Flow, ExecError> {
        for stmt in stmts {
            match self.stmt(act, stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn stmt(&mut self, act: &mut Activation<'_>, stmt: &Stmt) -> Result<Flow, ExecError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.expr(act, expr)?;
            }
            StmtKind::Assign { place, op, value } => {
                let mut value = self.expr(act, value)?;
                if let Some(op) = op {
                    let current = self.read_place(act, place, stmt.span)?;
                    value = binary(act, *op, current, value, stmt.span)?;
                }
                self.write_place(act, place, value, stmt.span)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if self.condition(act, cond)? {
                    then_branch
                } else {
                    else_branch
                };
                return self.block(act, branch);
            }
            StmtKind::Loop { cond, body, post } => loop {
                if let Some(cond) = cond {
                    if !self.condition(act, cond)? {
                        break;
                    }
                }
                match self.block(act, body)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
                self.block(act, post)?;
            },
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.expr(act, expr)?,
                    None => Value::Void,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::BindImport(index) => act.routine.context.bind(*index),
            StmtKind::Invoke(routine) => {
                self.run(routine, Vec::new(), stmt.span)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn condition(&mut self, act: &mut Activation<'_>, cond: &Expr) -> Result<bool, ExecError> {
        let value = self.expr(act, cond)?;
        value.as_bool().ok_or_else(|| {
            act.error(
                ExecErrorKind::TypeMismatch {
                    op: "if",
                    left: "bool",
                    right: value.type_name(),
                },
                cond.span,
            )
        })
    }

    fn expr(&mut self, act: &mut Activation<'_>, expr: &Expr) -> Result<Value, ExecError> {
        ensure_sufficient_stack(|| self.expr_inner(act, expr))
    }

    fn expr_inner(&mut self, act: &mut Activation<'_>, expr: &Expr) -> Result<Value, ExecError> {
        match &expr.kind {
            ExprKind::Const(value) => Ok(value.clone()),
            ExprKind::Local(index) => Ok(act
                .locals
                .get(*index as usize)
                .cloned()
                .unwrap_or(Value::Void)),
            ExprKind::Global { slot, name } => self.load(act, *slot, name, expr.span),
            ExprKind::Imported { import, slot, name } => {
                check_bound(act, *import, expr.span)?;
                self.load(act, *slot, name, expr.span)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.expr(act, operand)?;
                match (op, &value) {
                    (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    _ => Err(act.error(
                        ExecErrorKind::TypeMismatch {
                            op: op.symbol(),
                            left: value.type_name(),
                            right: value.type_name(),
                        },
                        expr.span,
                    )),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.expr(act, lhs)?;
                // Short-circuit.
                match (op, &left) {
                    (BinaryOp::And, Value::Bool(false)) => return Ok(Value::Bool(false)),
                    (BinaryOp::Or, Value::Bool(true)) => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let right = self.expr(act, rhs)?;
                binary(act, *op, left, right, expr.span)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.expr(act, callee)?;
                let Value::Func(routine) = callee_value else {
                    return Err(act.error(
                        ExecErrorKind::NotCallable {
                            found: callee_value.type_name(),
                        },
                        expr.span,
                    ));
                };
                let mut values = Vec::with_capacity(routine.locals.max(args.len()));
                for arg in args {
                    values.push(self.expr(act, arg)?);
                }
                self.run(&routine, values, expr.span)
            }
            ExprKind::Builtin { builtin, args } => {
                let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
                for arg in args {
                    values.push(self.expr(act, arg)?);
                }
                self.builtin(act, *builtin, &values, expr.span)
            }
        }
    }

    fn builtin(
        &self,
        act: &Activation<'_>,
        builtin: Builtin,
        args: &[Value],
        span: Span,
    ) -> Result<Value, ExecError> {
        match builtin {
            Builtin::Println => {
                let line = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.env.print.println(&line);
                Ok(Value::Void)
            }
            Builtin::Print => {
                let text: String = args.iter().map(ToString::to_string).collect();
                self.env.print.print(&text);
                Ok(Value::Void)
            }
            Builtin::Len => match args.first() {
                Some(Value::Str(s)) => Ok(Value::Int(i64::try_from(s.len()).unwrap_or(i64::MAX))),
                other => Err(act.error(
                    ExecErrorKind::TypeMismatch {
                        op: "len",
                        left: "string",
                        right: other.map_or("void", Value::type_name),
                    },
                    span,
                )),
            },
            Builtin::Panic => Err(act.error(
                ExecErrorKind::Panic {
                    message: args.first().map(ToString::to_string).unwrap_or_default(),
                },
                span,
            )),
        }
    }

    fn load(
        &self,
        act: &Activation<'_>,
        slot: Slot,
        name: &str,
        span: Span,
    ) -> Result<Value, ExecError> {
        self.frame.load(slot).ok_or_else(|| {
            let kind = if slot.index() >= self.frame.len() {
                ExecErrorKind::SlotOutOfRange {
                    name: name.to_string(),
                }
            } else {
                ExecErrorKind::Uninitialized {
                    name: name.to_string(),
                }
            };
            act.error(kind, span)
        })
    }

    fn read_place(
        &self,
        act: &Activation<'_>,
        place: &Place,
        span: Span,
    ) -> Result<Value, ExecError> {
        match place {
            Place::Local(index) => Ok(act
                .locals
                .get(*index as usize)
                .cloned()
                .unwrap_or(Value::Void)),
            Place::Global { slot, name } => self.load(act, *slot, name, span),
            Place::Imported { import, slot, name } => {
                check_bound(act, *import, span)?;
                self.load(act, *slot, name, span)
            }
            Place::Discard => Ok(Value::Void),
        }
    }

    fn write_place(
        &self,
        act: &mut Activation<'_>,
        place: &Place,
        value: Value,
        span: Span,
    ) -> Result<(), ExecError> {
        let (slot, name) = match place {
            Place::Local(index) => {
                if let Some(local) = act.locals.get_mut(*index as usize) {
                    *local = value;
                }
                return Ok(());
            }
            Place::Discard => return Ok(()),
            Place::Global { slot, name } => (*slot, name),
            Place::Imported { import, slot, name } => {
                check_bound(act, *import, span)?;
                (*slot, name)
            }
        };
        if self.frame.store(slot, value) {
            Ok(())
        } else {
            Err(act.error(
                ExecErrorKind::SlotOutOfRange {
                    name: name.to_string(),
                },
                span,
            ))
        }
    }
}

fn check_bound(act: &Activation<'_>, import: u32, span: Span) -> Result<(), ExecError> {
    let context = &act.routine.context;
    if context.is_bound(import) {
        Ok(())
    } else {
        Err(act.error(
            ExecErrorKind::ImportNotBound {
                path: context.import_path(import).to_string(),
            },
            span,
        ))
    }
}

/// Apply a binary operator to two evaluated operands.
fn binary(
    act: &Activation<'_>,
    op: BinaryOp,
    left: Value,
    right: Value,
    span: Span,
) -> Result<Value, ExecError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        _ => {}
    }
    let mismatch = || {
        act.error(
            ExecErrorKind::TypeMismatch {
                op: op.symbol(),
                left: left.type_name(),
                right: right.type_name(),
            },
            span,
        )
    };
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let value = match op {
                BinaryOp::Add => Value::Int(a.wrapping_add(b)),
                BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
                BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                    return Err(act.error(ExecErrorKind::DivisionByZero, span));
                }
                BinaryOp::Div => Value::Int(a.wrapping_div(b)),
                BinaryOp::Rem => Value::Int(a.wrapping_rem(b)),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::LtEq => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::GtEq => Value::Bool(a >= b),
                BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or => {
                    return Err(mismatch())
                }
            };
            Ok(value)
        }
        (Value::Str(a), Value::Str(b)) => {
            let value = match op {
                BinaryOp::Add => {
                    let mut joined = String::with_capacity(a.len() + b.len());
                    joined.push_str(a);
                    joined.push_str(b);
                    Value::string(joined)
                }
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::LtEq => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::GtEq => Value::Bool(a >= b),
                _ => return Err(mismatch()),
            };
            Ok(value)
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(*a && *b)),
            BinaryOp::Or => Ok(Value::Bool(*a || *b)),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}
