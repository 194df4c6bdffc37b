pub mod smoke;

/// Instantiates the shared provider checks for one provider constructor.
///
/// `$provider_ctor` is called once per test and must return an `Arc` of the provider; use
/// fully qualified paths in it since the tests live in their own module.
#[macro_export]
macro_rules! define_provider_tests {
    ($module:ident, $provider_ctor:expr) => {
        #[cfg(test)]
        mod $module {
            use $crate::smoke;

            #[test]
            fn smoke_allocator_returns_zeroed_buffers() {
                let provider = ($provider_ctor)();
                smoke::allocator_returns_zeroed_buffers(&provider);
            }

            #[test]
            fn smoke_zero_gradient_zeroes_every_lane() {
                let provider = ($provider_ctor)();
                smoke::zero_gradient_zeroes_every_lane(&provider);
            }

            #[test]
            fn smoke_copy_tensor_overwrites_destination() {
                let provider = ($provider_ctor)();
                smoke::copy_tensor_overwrites_destination(&provider);
            }

            #[test]
            fn smoke_copy_tensor_rejects_mismatched_shapes() {
                let provider = ($provider_ctor)();
                smoke::copy_tensor_rejects_mismatched_shapes(&provider);
            }

            #[test]
            fn smoke_reshape_copy_preserves_bytes() {
                let provider = ($provider_ctor)();
                smoke::reshape_copy_preserves_bytes(&provider);
            }

            #[test]
            fn smoke_add_with_scaled_other_matches_reference() {
                let provider = ($provider_ctor)();
                smoke::add_with_scaled_other_matches_reference(&provider);
            }

            #[test]
            fn smoke_leaky_relu_reads_alpha_attribute() {
                let provider = ($provider_ctor)();
                smoke::leaky_relu_reads_alpha_attribute(&provider);
            }

            #[test]
            fn smoke_sgd_step_matches_reference() {
                let provider = ($provider_ctor)();
                smoke::sgd_step_matches_reference(&provider);
            }

            #[test]
            fn smoke_adam_first_step_moves_against_gradient() {
                let provider = ($provider_ctor)();
                smoke::adam_first_step_moves_against_gradient(&provider);
            }

            #[test]
            fn smoke_unknown_operator_fails() {
                let provider = ($provider_ctor)();
                smoke::unknown_operator_fails(&provider);
            }

            #[test]
            fn smoke_invoke_checks_output_count() {
                let provider = ($provider_ctor)();
                smoke::invoke_checks_output_count(&provider);
            }
        }
    };
}
