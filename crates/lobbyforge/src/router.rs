//! Flag-routed dispatch for `Data` packets.
//!
//! A [`Router`] maps each [`Flag`] to one async handler. Handlers receive a
//! shared context (`&C`) and the [`Inbound`] packet, and answer with
//! `Result<(), AppError>`: a refusal is the handler's normal way of saying
//! "no", and the caller turns it into a Rejected packet.
//!
//! Handlers are plain functions returning a [`BoxFuture`]:
//!
//! ```rust,ignore
//! fn lobby_list(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, Result<(), AppError>> {
//!     async move { /* ... */ Ok(()) }.boxed()
//! }
//!
//! router.register(request::LOBBY_LIST, lobby_list)?;
//! ```

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use lobbyforge_protocol::{AppError, Flag, Inbound};

/// What a handler returns.
pub type HandlerResult = Result<(), AppError>;

type Handler<C> = Box<dyn for<'a> Fn(&'a C, Inbound) -> BoxFuture<'a, HandlerResult> + Send + Sync>;

/// Errors from building a route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// A handler is already registered for this flag. The original one is
    /// kept.
    #[error("flag {0} already has a handler")]
    DuplicateFlag(Flag),
}

/// Errors from dispatching one packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Nothing is registered for this flag.
    #[error("no handler for flag {0}")]
    UnregisteredFlag(Flag),

    /// The handler refused the request.
    #[error(transparent)]
    Rejected(#[from] AppError),
}

impl DispatchError {
    /// The refusal to send back to the client.
    pub fn to_app_error(&self) -> AppError {
        match self {
            Self::UnregisteredFlag(_) => AppError::FlagNotRecognized,
            Self::Rejected(err) => err.clone(),
        }
    }
}

/// A table of `Flag → handler`.
pub struct Router<C> {
    routes: HashMap<Flag, Handler<C>>,
}

impl<C> Router<C> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Registers `handler` for `flag`.
    ///
    /// # Errors
    /// Returns [`RouterError::DuplicateFlag`] if `flag` is taken. The table
    /// is left unchanged.
    pub fn register<F>(&mut self, flag: Flag, handler: F) -> Result<(), RouterError>
    where
        F: for<'a> Fn(&'a C, Inbound) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        if self.routes.contains_key(&flag) {
            return Err(RouterError::DuplicateFlag(flag));
        }
        self.routes.insert(flag, Box::new(handler));
        Ok(())
    }

    /// Runs the handler registered for the packet's flag.
    ///
    /// # Errors
    /// - [`DispatchError::UnregisteredFlag`] if no handler matches
    /// - [`DispatchError::Rejected`] if the handler refused
    pub async fn dispatch(&self, ctx: &C, inbound: Inbound) -> Result<(), DispatchError> {
        let flag = inbound.packet.flag;
        let handler = self
            .routes
            .get(&flag)
            .ok_or(DispatchError::UnregisteredFlag(flag))?;
        handler(ctx, inbound).await?;
        Ok(())
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.routes.contains_key(&flag)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::FutureExt;
    use lobbyforge_protocol::{Channel, Header, Packet, PlayerId};

    /// Counts calls per handler so tests can see which one ran.
    #[derive(Default)]
    struct Calls {
        first: AtomicUsize,
        second: AtomicUsize,
    }

    fn first(ctx: &Calls, _inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
        async move {
            ctx.first.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn second(ctx: &Calls, _inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
        async move {
            ctx.second.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn refuse(_ctx: &Calls, _inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
        async move { Err(AppError::LobbyFull) }.boxed()
    }

    fn inbound(flag: u8) -> Inbound {
        Inbound {
            player_id: PlayerId(1),
            channel: Channel::Tcp,
            packet: Packet::new(Header::Data, Flag(flag), Vec::<u8>::new()),
        }
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_adds_route() {
        let mut router: Router<Calls> = Router::new();
        router.register(Flag(0x07), first).unwrap();
        assert!(router.contains(Flag(0x07)));
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_keeps_original() {
        let mut router: Router<Calls> = Router::new();
        router.register(Flag(0x11), first).unwrap();

        let err = router.register(Flag(0x11), second).unwrap_err();
        assert_eq!(err, RouterError::DuplicateFlag(Flag(0x11)));
        assert_eq!(router.len(), 1);

        let calls = Calls::default();
        router.dispatch(&calls, inbound(0x11)).await.unwrap();
        assert_eq!(calls.first.load(Ordering::SeqCst), 1);
        assert_eq!(calls.second.load(Ordering::SeqCst), 0);
    }

    // =====================================================================
    // dispatch()
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_picks_handler_by_flag() {
        let mut router: Router<Calls> = Router::new();
        router.register(Flag(0x04), first).unwrap();
        router.register(Flag(0x07), second).unwrap();
        let calls = Calls::default();

        router.dispatch(&calls, inbound(0x07)).await.unwrap();
        router.dispatch(&calls, inbound(0x07)).await.unwrap();

        assert_eq!(calls.first.load(Ordering::SeqCst), 0);
        assert_eq!(calls.second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dispatch_unregistered_flag() {
        let router: Router<Calls> = Router::new();
        let err = router
            .dispatch(&Calls::default(), inbound(0x42))
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::UnregisteredFlag(Flag(0x42)));
        assert_eq!(err.to_app_error(), AppError::FlagNotRecognized);
    }

    #[tokio::test]
    async fn test_dispatch_passes_refusal_through() {
        let mut router: Router<Calls> = Router::new();
        router.register(Flag(0x08), refuse).unwrap();

        let err = router
            .dispatch(&Calls::default(), inbound(0x08))
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::Rejected(AppError::LobbyFull));
        assert_eq!(err.to_app_error().code(), "LOBBY_FULL");
    }
}
