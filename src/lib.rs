//! # Introduction
//!
//! taskfog is a control-flow obfuscator for a subset of C. Every user-defined
//! function becomes a task: a call site fills a per-function call record,
//! queues `(function, record)` on a load-balanced worker, and busy-waits for
//! the record's `done` flag while draining its own queue. The static call
//! graph disappears from the rewritten source; control flow is decided at run
//! time by the scheduler.
//!
//! ## Pipeline
//!
//! ```text
//! Sources → Parser → SymbolTable + Registry → Transformer → rewritten units
//!                                    ↓
//!                            DeclarationUnit → taskfog_records.hpp
//! ```
//!
//! 1. [`parser`] — tokenises each unit and builds an AST with exact spans.
//! 2. [`registry`] — collects every transformable function, its record layout,
//!    symbol and static weight.
//! 3. [`transform`] — rewrites signatures, parameter references, returns,
//!    global accesses and calls by splicing text into the original source.
//! 4. [`emit`] — renders the declaration unit shared by all rewritten units.
//! 5. [`runtime`] — the scheduler, load balancer, record pools and globals
//!    lock the rewritten program links against (also exported as a C ABI).
//! 6. [`pipeline`] — ties the above together over files on disk.
//!
//! ## Supported C subset
//!
//! Types: `int`, `char`, `short`, `long`, `float`, `double`, `bool`, `void`,
//! structs, pointers, fixed-size arrays. Control flow: `if/else`, `while`,
//! `for`, `do-while`, `switch/case`, `break`, `continue`, `goto`, `return`.

pub mod config;
pub mod emit;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod transform;
