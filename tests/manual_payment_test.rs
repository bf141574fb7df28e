//! Card-to-card top-ups and manual order payments reviewed by an admin

mod helpers;

use assert_matches::assert_matches;
use serial_test::serial;

use helpers::TEST_ADMIN_TELEGRAM_ID;
use hiddyshop::models::{DiscountType, OrderStatus, PaymentStatus};
use hiddyshop::ShopError;

#[tokio::test]
#[serial]
async fn test_topup_approval_credits_wallet_once() {
    let ctx = require_context!();
    let user = ctx.create_user(710_001).await;

    let payment = ctx.services.payment_service.request_topup(&user, 250_000).await.unwrap();
    assert_eq!(payment.status(), Some(PaymentStatus::Pending));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 0);

    let approved = ctx
        .services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();
    assert_eq!(approved.status(), Some(PaymentStatus::Success));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 250_000);

    let again = ctx
        .services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await;
    assert_matches!(again, Err(ShopError::InvalidStateTransition { .. }));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 250_000);
    assert_eq!(ctx.database.ledger_total(user.id).await.unwrap(), 250_000);

    let texts = ctx.telegram.texts_to(user.telegram_id).await;
    assert!(texts.iter().any(|t| t.contains("top-up") && t.contains("approved")));
}

#[tokio::test]
#[serial]
async fn test_topup_outside_limits_is_refused() {
    let ctx = require_context!();
    let user = ctx.create_user(710_002).await;

    let too_small = ctx.services.payment_service.request_topup(&user, 500).await;
    assert_matches!(too_small, Err(ShopError::InvalidAmount(_)));

    let too_large = ctx.services.payment_service.request_topup(&user, 50_000_000).await;
    assert_matches!(too_large, Err(ShopError::InvalidAmount(_)));

    assert_eq!(ctx.database.count_records("payments").await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_rejected_topup_changes_nothing() {
    let ctx = require_context!();
    let user = ctx.create_user(710_003).await;

    let payment = ctx.services.payment_service.request_topup(&user, 100_000).await.unwrap();
    let rejected = ctx
        .services
        .payment_service
        .verify_payment(payment.id, false, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();

    assert_eq!(rejected.status(), Some(PaymentStatus::Failed));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_manual_order_completes_after_approval() {
    let ctx = require_context!();
    ctx.panel.mock_create_user_ok().await;

    let user = ctx.create_user(710_004).await;
    let plan = ctx.create_plan("Silver", 150_000).await;

    let (order, payment) = ctx
        .services
        .order_service
        .request_manual_payment(&user, plan.id, None)
        .await
        .unwrap();
    assert_eq!(order.status(), Some(OrderStatus::Pending));
    assert_eq!(payment.order_id, Some(order.id));
    assert_eq!(payment.amount, 150_000);

    // the configured admin hears about it
    let admin_texts = ctx.telegram.texts_to(TEST_ADMIN_TELEGRAM_ID).await;
    assert_eq!(admin_texts.len(), 1);

    ctx.services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();

    let order = ctx.services.order_service.get_order(order.id).await.unwrap();
    assert_eq!(order.status(), Some(OrderStatus::Completed));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 0);
    assert_eq!(ctx.services.user_service.panel_links(user.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_manual_order_panel_failure_credits_wallet() {
    let ctx = require_context!();
    ctx.panel.mock_create_user_failure(503).await;

    let user = ctx.create_user(710_005).await;
    let plan = ctx.create_plan("Gold", 300_000).await;
    let (order, payment) = ctx
        .services
        .order_service
        .request_manual_payment(&user, plan.id, None)
        .await
        .unwrap();

    let approved = ctx
        .services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();
    assert_eq!(approved.status(), Some(PaymentStatus::Success));

    let order = ctx.services.order_service.get_order(order.id).await.unwrap();
    assert_eq!(order.status(), Some(OrderStatus::Failed));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 300_000);
    assert_eq!(ctx.database.ledger_total(user.id).await.unwrap(), 300_000);
}

#[tokio::test]
#[serial]
async fn test_manual_order_link_failure_credits_wallet() {
    let ctx = require_context!();
    // the panel hands out a uuid that is already linked to another order
    ctx.panel.mock_create_user_fixed_uuid("11111111-2222-3333-4444-555555555555").await;

    let buyer = ctx.create_funded_user(710_008, 100_000).await;
    let plan = ctx.create_plan("Silver", 100_000).await;
    ctx.services
        .order_service
        .purchase_with_wallet(&buyer, plan.id, None)
        .await
        .unwrap();

    let user = ctx.create_user(710_009).await;
    let (order, payment) = ctx
        .services
        .order_service
        .request_manual_payment(&user, plan.id, None)
        .await
        .unwrap();

    let approved = ctx
        .services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();
    assert_eq!(approved.status(), Some(PaymentStatus::Success));

    let order = ctx.services.order_service.get_order(order.id).await.unwrap();
    assert_eq!(order.status(), Some(OrderStatus::Failed));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 100_000);
    assert_eq!(ctx.database.ledger_total(user.id).await.unwrap(), 100_000);
    assert!(ctx.services.user_service.panel_links(user.id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_pending_manual_order_holds_single_use_code() {
    let ctx = require_context!();
    ctx.panel.mock_create_user_ok().await;

    ctx.create_discount("once", DiscountType::Fixed, 20_000, 1).await;
    let plan = ctx.create_plan("Silver", 150_000).await;
    let first = ctx.create_user(710_010).await;
    let second = ctx.create_user(710_011).await;

    let (first_order, first_payment) = ctx
        .services
        .order_service
        .request_manual_payment(&first, plan.id, Some("once"))
        .await
        .unwrap();
    assert_eq!(first_payment.amount, 130_000);
    assert_eq!(ctx.database.discount_used_count("ONCE").await.unwrap(), 1);

    let taken = ctx
        .services
        .order_service
        .request_manual_payment(&second, plan.id, Some("once"))
        .await;
    assert_matches!(taken, Err(ShopError::DiscountInvalid(_)));

    // rejecting the first payment frees the code for someone else
    ctx.services
        .payment_service
        .verify_payment(first_payment.id, false, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();
    let first_order = ctx.services.order_service.get_order(first_order.id).await.unwrap();
    assert_eq!(first_order.status(), Some(OrderStatus::Failed));
    assert_eq!(ctx.database.discount_used_count("ONCE").await.unwrap(), 0);

    let (second_order, second_payment) = ctx
        .services
        .order_service
        .request_manual_payment(&second, plan.id, Some("once"))
        .await
        .unwrap();
    ctx.services
        .payment_service
        .verify_payment(second_payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await
        .unwrap();

    let second_order = ctx.services.order_service.get_order(second_order.id).await.unwrap();
    assert_eq!(second_order.status(), Some(OrderStatus::Completed));
    assert_eq!(second_order.discount_amount, 20_000);
    assert_eq!(ctx.database.discount_used_count("ONCE").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_approval_refused_when_order_no_longer_pending() {
    let ctx = require_context!();

    let user = ctx.create_user(710_012).await;
    let plan = ctx.create_plan("Silver", 150_000).await;
    let (order, payment) = ctx
        .services
        .order_service
        .request_manual_payment(&user, plan.id, None)
        .await
        .unwrap();
    ctx.services.order_service.cancel_pending_order(order.id).await.unwrap();

    let result = ctx
        .services
        .payment_service
        .verify_payment(payment.id, true, TEST_ADMIN_TELEGRAM_ID)
        .await;
    assert_matches!(result, Err(ShopError::InvalidStateTransition { .. }));

    // no money was accepted, so the payment stays open and the wallet untouched
    let payment = ctx.services.payment_service.get_payment(payment.id).await.unwrap();
    assert_eq!(payment.status(), Some(PaymentStatus::Pending));
    assert_eq!(ctx.services.wallet_service.balance(user.id).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_free_order_cannot_use_manual_payment() {
    let ctx = require_context!();

    let user = ctx.create_user(710_006).await;
    let plan = ctx.create_plan("Trial", 0).await;

    let result = ctx.services.order_service.request_manual_payment(&user, plan.id, None).await;
    assert_matches!(result, Err(ShopError::InvalidAmount(_)));
}

#[tokio::test]
#[serial]
async fn test_manual_payments_feature_flag() {
    let Some(ctx) = helpers::TestContext::with_settings(|s| s.features.manual_payments = false).await else {
        eprintln!("skipping: no test database");
        return;
    };
    let user = ctx.create_user(710_007).await;

    let result = ctx.services.payment_service.request_topup(&user, 100_000).await;
    assert_matches!(result, Err(ShopError::ServiceUnavailable(_)));
}
