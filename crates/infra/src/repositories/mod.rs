mod impls;

pub use impls::{
    AppendMessage, InMemoryEntityRepository, InMemoryMessageRepository,
    InMemoryReadCursorRepository,
};
